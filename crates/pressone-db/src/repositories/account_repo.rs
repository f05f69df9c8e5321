//! Account repository implementation
//!
//! Read side only. Balances move exclusively through the ledger transaction,
//! which also writes the matching `ledger_entries` row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pressone_core::{models::Account, traits::AccountRepository, AppError, AppResult};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of AccountRepository
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count all accounts
    #[instrument(skip(self))]
    pub async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting accounts: {}", e);
                AppError::Database(format!("Failed to count accounts: {}", e))
            })?;

        Ok(result.0)
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Account>> {
        debug!("Finding account by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, AccountRow>(
            r#"
            SELECT id, name, caller_id, credit_balance, total_spent, total_calls,
                   created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding account {}: {}", id, e);
            AppError::Database(format!("Failed to find account: {}", e))
        })?;

        Ok(result.map(|row| row.into()))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    caller_id: Option<String>,
    credit_balance: Decimal,
    total_spent: Decimal,
    total_calls: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            name: row.name,
            caller_id: row.caller_id,
            credit_balance: row.credit_balance,
            total_spent: row.total_spent,
            total_calls: row.total_calls,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
