//! Account model
//!
//! One prepaid account per operator. The credit balance moves only through
//! ledger entries: debits for settled calls, credits for completed payments.

use crate::config::PrecallCheck;
use crate::models::call::normalize_number;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i64,

    /// Display name
    pub name: String,

    /// Default caller id for this operator's campaigns
    pub caller_id: Option<String>,

    /// Prepaid credits; may go negative after post-call reconciliation
    pub credit_balance: Decimal,

    /// Lifetime credits spent on calls
    pub total_spent: Decimal,

    /// Lifetime number of billed calls
    pub total_calls: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Check whether a new call may be originated under `check`
    pub fn passes_precall(&self, check: PrecallCheck, minimum: Decimal) -> bool {
        match check {
            PrecallCheck::Off => true,
            PrecallCheck::Positive => self.credit_balance > Decimal::ZERO,
            PrecallCheck::Minimum => self.credit_balance >= minimum,
        }
    }

    /// Check if the balance is below zero
    pub fn has_deficit(&self) -> bool {
        self.credit_balance < Decimal::ZERO
    }
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            caller_id: None,
            credit_balance: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            total_calls: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Validate a caller id: 10 to 15 digits once formatting is removed.
///
/// Returns the normalized digits.
pub fn validate_caller_id(caller_id: &str) -> Result<String, String> {
    let digits = normalize_number(caller_id);
    if digits.len() < 10 || digits.len() > 15 {
        return Err("caller id must be 10-15 digits".to_string());
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_precall_off_always_passes() {
        let account = Account {
            credit_balance: dec!(-3.00),
            ..Default::default()
        };
        assert!(account.passes_precall(PrecallCheck::Off, dec!(1)));
        assert!(account.has_deficit());
    }

    #[test]
    fn test_precall_positive() {
        let mut account = Account::default();
        assert!(!account.passes_precall(PrecallCheck::Positive, dec!(0)));

        account.credit_balance = dec!(0.0001);
        assert!(account.passes_precall(PrecallCheck::Positive, dec!(0)));
    }

    #[test]
    fn test_precall_minimum() {
        let account = Account {
            credit_balance: dec!(0.10),
            ..Default::default()
        };
        assert!(account.passes_precall(PrecallCheck::Minimum, dec!(0.1)));
        assert!(!account.passes_precall(PrecallCheck::Minimum, dec!(0.11)));
    }

    #[test]
    fn test_validate_caller_id() {
        assert_eq!(validate_caller_id("+1 (555) 123-4567").unwrap(), "15551234567");
        assert!(validate_caller_id("555-1234").is_err());
        assert!(validate_caller_id("1234567890123456").is_err());
    }
}
