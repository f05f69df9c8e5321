//! Credit package repository implementation
//!
//! The package catalog lives in the database so prices can change without a
//! redeploy. Writes lock the existing row before replacing it.

use async_trait::async_trait;
use pressone_core::{
    models::CreditPackage, traits::CreditPackageRepository, AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

/// PostgreSQL implementation of CreditPackageRepository
pub struct PgCreditPackageRepository {
    pool: PgPool,
}

impl PgCreditPackageRepository {
    /// Create a new credit package repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditPackageRepository for PgCreditPackageRepository {
    #[instrument(skip(self))]
    async fn list(&self, include_inactive: bool) -> AppResult<Vec<CreditPackage>> {
        let rows = sqlx::query_as::<sqlx::Postgres, CreditPackageRow>(
            r#"
            SELECT code, credits, price, currency, active
            FROM credit_packages
            WHERE active OR $1
            ORDER BY credits
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing credit packages: {}", e);
            AppError::Database(format!("Failed to list credit packages: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find(&self, code: &str) -> AppResult<Option<CreditPackage>> {
        let row = sqlx::query_as::<sqlx::Postgres, CreditPackageRow>(
            "SELECT code, credits, price, currency, active FROM credit_packages WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding credit package {}: {}", code, e);
            AppError::Database(format!("Failed to find credit package: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, package), fields(code = %package.code))]
    async fn upsert(&self, package: &CreditPackage) -> AppResult<CreditPackage> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT code FROM credit_packages WHERE code = $1 FOR UPDATE")
                .bind(&package.code)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to lock credit package: {}", e);
                    AppError::Database(format!("Failed to lock credit package: {}", e))
                })?;

        let query = if existing.is_some() {
            debug!("Updating credit package {}", package.code);
            r#"
            UPDATE credit_packages
            SET credits = $2, price = $3, currency = $4, active = $5, updated_at = NOW()
            WHERE code = $1
            RETURNING code, credits, price, currency, active
            "#
        } else {
            debug!("Inserting credit package {}", package.code);
            r#"
            INSERT INTO credit_packages (code, credits, price, currency, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING code, credits, price, currency, active
            "#
        };

        let row = sqlx::query_as::<sqlx::Postgres, CreditPackageRow>(query)
            .bind(&package.code)
            .bind(package.credits)
            .bind(package.price)
            .bind(&package.currency)
            .bind(package.active)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to write credit package {}: {}", package.code, e);
                AppError::Database(format!("Failed to write credit package: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!("Stored credit package {}", row.code);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, code: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE credit_packages SET active = FALSE, updated_at = NOW() WHERE code = $1",
        )
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error deactivating credit package {}: {}", code, e);
            AppError::Database(format!("Failed to deactivate credit package: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreditPackageRow {
    code: String,
    credits: Decimal,
    price: Decimal,
    currency: String,
    active: bool,
}

impl From<CreditPackageRow> for CreditPackage {
    fn from(row: CreditPackageRow) -> Self {
        CreditPackage {
            code: row.code,
            credits: row.credits,
            price: row.price,
            currency: row.currency,
            active: row.active,
        }
    }
}
