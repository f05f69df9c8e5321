//! Campaign repository implementation
//!
//! Campaign rows carry the aggregate counters; they are read here and
//! written only by the ledger transaction. Item claiming uses
//! `FOR UPDATE SKIP LOCKED` so several dialers never take the same number.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pressone_core::{
    models::{
        Campaign, CampaignItem, CampaignItemStatus, CampaignStats, CampaignStatus, NewCampaign,
    },
    traits::CampaignRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

pub(crate) const CAMPAIGN_COLUMNS: &str = r#"
    id, account_id, name, trunk_id, caller_id, cps, max_concurrent, status,
    total_numbers, completed, answered, pressed_one, failed, actual_cost,
    created_at, started_at
"#;

/// PostgreSQL implementation of CampaignRepository
pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_status(s: &str) -> CampaignStatus {
        CampaignStatus::from_str(s).unwrap_or(CampaignStatus::Paused)
    }

    fn parse_item_status(s: &str) -> CampaignItemStatus {
        CampaignItemStatus::from_str(s).unwrap_or(CampaignItemStatus::Pending)
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Campaign>> {
        debug!("Finding campaign by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding campaign {}: {}", id, e);
            AppError::Database(format!("Failed to find campaign: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, campaign), fields(account_id = campaign.account_id))]
    async fn create(&self, campaign: &NewCampaign) -> AppResult<Campaign> {
        debug!("Creating campaign: {}", campaign.name);

        let row = sqlx::query_as::<sqlx::Postgres, CampaignRow>(&format!(
            r#"
            INSERT INTO campaigns (account_id, name, trunk_id, caller_id, cps, max_concurrent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(campaign.account_id)
        .bind(&campaign.name)
        .bind(campaign.trunk_id)
        .bind(&campaign.caller_id)
        .bind(campaign.cps)
        .bind(campaign.max_concurrent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating campaign: {}", e);
            if super::is_foreign_key_violation(&e) {
                AppError::AccountNotFound(campaign.account_id.to_string())
            } else {
                AppError::Database(format!("Failed to create campaign: {}", e))
            }
        })?;

        info!("Created campaign {} for account {}", row.id, row.account_id);
        Ok(row.into())
    }

    #[instrument(skip(self, numbers), fields(count = numbers.len()))]
    async fn add_items(&self, campaign_id: i64, numbers: &[String]) -> AppResult<u64> {
        if numbers.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO campaign_items (campaign_id, phone_number)
            SELECT $1, number FROM UNNEST($2::text[]) AS number
            "#,
        )
        .bind(campaign_id)
        .bind(numbers)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert campaign items: {}", e);
            if super::is_foreign_key_violation(&e) {
                AppError::CampaignNotFound(campaign_id.to_string())
            } else {
                AppError::Database(format!("Failed to insert campaign items: {}", e))
            }
        })?
        .rows_affected();

        sqlx::query("UPDATE campaigns SET total_numbers = total_numbers + $2 WHERE id = $1")
            .bind(campaign_id)
            .bind(inserted as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to update campaign {} totals: {}", campaign_id, e);
                AppError::Database(format!("Failed to update campaign totals: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        debug!("Added {} numbers to campaign {}", inserted, campaign_id);
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: i64, status: CampaignStatus) -> AppResult<Campaign> {
        let row = sqlx::query_as::<sqlx::Postgres, CampaignRow>(&format!(
            r#"
            UPDATE campaigns
            SET status = $2,
                started_at = CASE WHEN $2 = 'running' THEN COALESCE(started_at, NOW())
                                  ELSE started_at END
            WHERE id = $1
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating campaign {}: {}", id, e);
            AppError::Database(format!("Failed to update campaign: {}", e))
        })?
        .ok_or_else(|| AppError::CampaignNotFound(id.to_string()))?;

        info!("Campaign {} is now {}", id, status);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn claim_next_item(&self, campaign_id: i64) -> AppResult<Option<CampaignItem>> {
        let row = sqlx::query_as::<sqlx::Postgres, CampaignItemRow>(
            r#"
            UPDATE campaign_items
            SET status = 'dialing'
            WHERE id = (
                SELECT id FROM campaign_items
                WHERE campaign_id = $1 AND status = 'pending'
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, campaign_id, phone_number, status, call_id
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error claiming item of campaign {}: {}", campaign_id, e);
            AppError::Database(format!("Failed to claim campaign item: {}", e))
        })?;

        Ok(row.map(|r| CampaignItem {
            id: r.id,
            campaign_id: r.campaign_id,
            phone_number: r.phone_number,
            status: Self::parse_item_status(&r.status),
            call_id: r.call_id,
        }))
    }

    #[instrument(skip(self))]
    async fn release_item(&self, item_id: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE campaign_items SET status = 'pending', call_id = NULL WHERE id = $1 AND status = 'dialing'",
        )
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error releasing item {}: {}", item_id, e);
            AppError::Database(format!("Failed to release campaign item: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_item_count(&self, campaign_id: i64) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaign_items WHERE campaign_id = $1 AND status <> 'completed'",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting open items: {}", e);
            AppError::Database(format!("Failed to count campaign items: {}", e))
        })?;

        Ok(count.0)
    }

    #[instrument(skip(self))]
    async fn complete_if_drained(&self, campaign_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'completed'
            WHERE id = $1
              AND status = 'running'
              AND NOT EXISTS (
                  SELECT 1 FROM campaign_items
                  WHERE campaign_id = $1 AND status <> 'completed'
              )
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error completing campaign {}: {}", campaign_id, e);
            AppError::Database(format!("Failed to complete campaign: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_running(&self) -> AppResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<sqlx::Postgres, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = 'running' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing running campaigns: {}", e);
            AppError::Database(format!("Failed to list campaigns: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_by_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Campaign>, i64)> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting campaigns: {}", e);
                AppError::Database(format!("Failed to count campaigns: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, CampaignRow>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing campaigns: {}", e);
            AppError::Database(format!("Failed to list campaigns: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CampaignRow {
    id: i64,
    account_id: i64,
    name: String,
    trunk_id: Option<i64>,
    caller_id: Option<String>,
    cps: i32,
    max_concurrent: i32,
    status: String,
    total_numbers: i64,
    completed: i64,
    answered: i64,
    pressed_one: i64,
    failed: i64,
    actual_cost: Decimal,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            trunk_id: row.trunk_id,
            caller_id: row.caller_id,
            cps: row.cps,
            max_concurrent: row.max_concurrent,
            status: PgCampaignRepository::parse_status(&row.status),
            stats: CampaignStats {
                total_numbers: row.total_numbers,
                completed: row.completed,
                answered: row.answered,
                pressed_one: row.pressed_one,
                failed: row.failed,
                actual_cost: row.actual_cost,
            },
            created_at: row.created_at,
            started_at: row.started_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignItemRow {
    id: i64,
    campaign_id: i64,
    phone_number: String,
    status: String,
    call_id: Option<String>,
}
