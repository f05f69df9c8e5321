//! Statistics DTOs

use pressone_db::GlobalStats;
use rust_decimal::Decimal;
use serde::Serialize;

/// Platform-wide dashboard counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub totals: GlobalStats,
    /// Answered calls over all calls, in percent
    pub success_rate: Decimal,
}

impl From<GlobalStats> for StatsResponse {
    fn from(totals: GlobalStats) -> Self {
        let success_rate = totals.success_rate();
        Self {
            totals,
            success_rate,
        }
    }
}
