//! Call repository implementation
//!
//! Calls are keyed by the correlation id generated at origination. Only the
//! QUEUED → ORIGINATING step is written here; every later transition goes
//! through the ledger transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pressone_core::{
    models::{Call, CallState, NewCall},
    traits::CallRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

pub(crate) const CALL_COLUMNS: &str = r#"
    call_id, campaign_id, campaign_item_id, account_id, trunk_id,
    destination, caller_id, state, duration_seconds, billed_cost,
    hangup_cause, created_at, updated_at, ended_at
"#;

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self, call), fields(call_id = %call.call_id))]
    async fn create_queued(&self, call: &NewCall) -> AppResult<Call> {
        debug!("Creating queued call to {}", call.destination);

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            INSERT INTO calls (
                call_id, campaign_id, campaign_item_id, account_id,
                trunk_id, destination, caller_id, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'QUEUED')
            RETURNING {CALL_COLUMNS}
            "#
        ))
        .bind(&call.call_id)
        .bind(call.campaign_id)
        .bind(call.campaign_item_id)
        .bind(call.account_id)
        .bind(call.trunk_id)
        .bind(&call.destination)
        .bind(&call.caller_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error creating call: {}", e);
            if super::is_unique_violation(&e) {
                AppError::AlreadyExists(format!("Call {} already exists", call.call_id))
            } else {
                AppError::Database(format!("Failed to create call: {}", e))
            }
        })?;

        if let Some(item_id) = call.campaign_item_id {
            sqlx::query("UPDATE campaign_items SET call_id = $2 WHERE id = $1")
                .bind(item_id)
                .bind(&call.call_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to link campaign item {}: {}", item_id, e);
                    AppError::Database(format!("Failed to link campaign item: {}", e))
                })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn mark_originating(&self, call_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET state = 'ORIGINATING', updated_at = NOW()
            WHERE call_id = $1 AND state = 'QUEUED'
            "#,
        )
        .bind(call_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating call {}: {}", call_id, e);
            AppError::Database(format!("Failed to update call: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn find_by_call_id(&self, call_id: &str) -> AppResult<Option<Call>> {
        debug!("Finding call: {}", call_id);

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            "SELECT {CALL_COLUMNS} FROM calls WHERE call_id = $1"
        ))
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding call {}: {}", call_id, e);
            AppError::Database(format!("Failed to find call: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Call>, i64)> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM calls WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting calls: {}", e);
                AppError::Database(format!("Failed to count calls: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            SELECT {CALL_COLUMNS}
            FROM calls
            WHERE campaign_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(campaign_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing calls of campaign {}: {}", campaign_id, e);
            AppError::Database(format!("Failed to list calls: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self))]
    async fn find_stale(&self, older_than_secs: i64, limit: i64) -> AppResult<Vec<Call>> {
        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            SELECT {CALL_COLUMNS}
            FROM calls
            WHERE billed_cost IS NULL
              AND state IN ('QUEUED', 'ORIGINATING')
              AND created_at < NOW() - make_interval(secs => $1)
            ORDER BY created_at
            LIMIT $2
            "#
        ))
        .bind(older_than_secs as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding stale calls: {}", e);
            AppError::Database(format!("Failed to find stale calls: {}", e))
        })?;

        debug!("Found {} stale calls", rows.len());
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CallRow {
    call_id: String,
    campaign_id: Option<i64>,
    campaign_item_id: Option<i64>,
    account_id: i64,
    trunk_id: i64,
    destination: String,
    caller_id: Option<String>,
    state: String,
    duration_seconds: i32,
    billed_cost: Option<Decimal>,
    hangup_cause: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl From<CallRow> for Call {
    fn from(row: CallRow) -> Self {
        Call {
            call_id: row.call_id,
            campaign_id: row.campaign_id,
            campaign_item_id: row.campaign_item_id,
            account_id: row.account_id,
            trunk_id: row.trunk_id,
            destination: row.destination,
            caller_id: row.caller_id,
            // Unknown strings can only come from manual edits; treat them as failed
            state: CallState::from_str(&row.state).unwrap_or(CallState::Failed),
            duration_seconds: row.duration_seconds,
            billed_cost: row.billed_cost,
            hangup_cause: row.hangup_cause,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ended_at: row.ended_at,
        }
    }
}
