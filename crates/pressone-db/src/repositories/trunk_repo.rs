//! Trunk identity repository implementation

use async_trait::async_trait;
use pressone_core::{
    models::{TrunkIdentity, TrunkStatus},
    traits::TrunkRepository,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of TrunkRepository
pub struct PgTrunkRepository {
    pool: PgPool,
}

impl PgTrunkRepository {
    /// Create a new trunk repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_status(s: &str) -> TrunkStatus {
        TrunkStatus::from_str(s).unwrap_or(TrunkStatus::Disabled)
    }
}

#[async_trait]
impl TrunkRepository for PgTrunkRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<TrunkIdentity>> {
        debug!("Finding trunk by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, TrunkRow>(
            r#"
            SELECT id, account_id, name, endpoint, max_channels, status
            FROM trunks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding trunk {}: {}", id, e);
            AppError::Database(format!("Failed to find trunk: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_for_account(&self, account_id: i64) -> AppResult<Vec<TrunkIdentity>> {
        let rows = sqlx::query_as::<sqlx::Postgres, TrunkRow>(
            r#"
            SELECT id, account_id, name, endpoint, max_channels, status
            FROM trunks
            WHERE account_id = $1
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing trunks of account {}: {}", account_id, e);
            AppError::Database(format!("Failed to list trunks: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct TrunkRow {
    id: i64,
    account_id: i64,
    name: String,
    endpoint: String,
    max_channels: i32,
    status: String,
}

impl From<TrunkRow> for TrunkIdentity {
    fn from(row: TrunkRow) -> Self {
        TrunkIdentity {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            endpoint: row.endpoint,
            max_channels: row.max_channels,
            status: PgTrunkRepository::parse_status(&row.status),
        }
    }
}
