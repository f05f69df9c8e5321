//! Global dashboard statistics

use pressone_core::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, instrument};

/// Platform-wide counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GlobalStats {
    pub total_accounts: i64,
    pub total_campaigns: i64,
    pub running_campaigns: i64,
    pub total_calls: i64,
    pub answered_calls: i64,
    pub pressed_one_calls: i64,
    pub total_billed: Decimal,
}

impl GlobalStats {
    /// Share of all calls that were answered, in percent
    pub fn success_rate(&self) -> Decimal {
        if self.total_calls == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.answered_calls) * Decimal::from(100) / Decimal::from(self.total_calls))
            .round_dp(2)
    }
}

/// Read-only aggregate queries across all accounts
pub struct PgStatsRepository {
    pool: PgPool,
}

impl PgStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn global(&self) -> AppResult<GlobalStats> {
        sqlx::query_as::<sqlx::Postgres, GlobalStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS total_accounts,
                (SELECT COUNT(*) FROM campaigns) AS total_campaigns,
                (SELECT COUNT(*) FROM campaigns WHERE status = 'running') AS running_campaigns,
                (SELECT COUNT(*) FROM calls) AS total_calls,
                (SELECT COUNT(*) FROM calls
                  WHERE state IN ('ANSWERED', 'DTMF_PRESSED', 'NO_DTMF')) AS answered_calls,
                (SELECT COUNT(*) FROM calls WHERE state = 'DTMF_PRESSED') AS pressed_one_calls,
                (SELECT COALESCE(SUM(billed_cost), 0) FROM calls) AS total_billed
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error computing global stats: {}", e);
            AppError::Database(format!("Failed to compute stats: {}", e))
        })
    }
}
