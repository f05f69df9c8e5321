//! Billing calculator
//!
//! Converts a reported call duration into a cost using telecom rounding:
//! a minimum billable duration, then round-up to the billing increment.
//! All arithmetic is decimal so costs add up exactly across campaigns.

use crate::config::BillingConfig;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on every billed cost
pub const COST_SCALE: u32 = 4;

/// Pure duration → cost function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingCalculator {
    rate_per_minute: Decimal,
    min_billable_seconds: i32,
    increment_seconds: i32,
}

impl BillingCalculator {
    /// Create a calculator; a non-positive minimum or increment is treated as 1 second
    pub fn new(rate_per_minute: Decimal, min_billable_seconds: i32, increment_seconds: i32) -> Self {
        Self {
            rate_per_minute,
            min_billable_seconds: min_billable_seconds.max(1),
            increment_seconds: increment_seconds.max(1),
        }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(
            config.rate_per_minute,
            config.min_billable_seconds,
            config.billing_increment_seconds,
        )
    }

    pub fn rate_per_minute(&self) -> Decimal {
        self.rate_per_minute
    }

    /// Seconds that will be charged for `duration_seconds`
    ///
    /// Zero for non-positive durations, otherwise the duration raised to the
    /// minimum and rounded up to the next increment.
    pub fn billable_seconds(&self, duration_seconds: i32) -> i32 {
        if duration_seconds <= 0 {
            return 0;
        }

        let seconds = duration_seconds.max(self.min_billable_seconds);
        let inc = self.increment_seconds;
        // ceil without overflowing near i32::MAX
        let buckets = seconds / inc + i32::from(seconds % inc != 0);
        buckets.saturating_mul(inc)
    }

    /// Cost of a call lasting `duration_seconds`, rounded to four decimals
    pub fn cost(&self, duration_seconds: i32) -> Decimal {
        let billable = self.billable_seconds(duration_seconds);
        if billable == 0 {
            return Decimal::ZERO;
        }

        let minutes = Decimal::from(billable) / Decimal::from(60);
        (minutes * self.rate_per_minute)
            .round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for BillingCalculator {
    fn default() -> Self {
        Self::from_config(&BillingConfig::default())
    }
}
