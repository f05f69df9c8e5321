//! Payment repository implementation
//!
//! Pending payments are registered here. Completion and the matching
//! balance credit happen inside the ledger transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pressone_core::{
    models::{NewPayment, Payment, PaymentStatus},
    traits::PaymentRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

pub(crate) const PAYMENT_COLUMNS: &str = r#"
    id, account_id, track_id, amount, currency, credits_requested,
    status, tx_hash, created_at, confirmed_at
"#;

/// PostgreSQL implementation of PaymentRepository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self, payment), fields(track_id = %payment.track_id))]
    async fn create_pending(&self, payment: &NewPayment) -> AppResult<Payment> {
        debug!(
            "Registering payment of {} {} for account {}",
            payment.amount, payment.currency, payment.account_id
        );

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (account_id, track_id, amount, currency, credits_requested)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.account_id)
        .bind(&payment.track_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.credits_requested)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating payment: {}", e);
            if super::is_unique_violation(&e) {
                AppError::AlreadyExists(format!("Payment {} already exists", payment.track_id))
            } else if super::is_foreign_key_violation(&e) {
                AppError::AccountNotFound(payment.account_id.to_string())
            } else {
                AppError::Database(format!("Failed to create payment: {}", e))
            }
        })?;

        info!("Registered pending payment {}", row.track_id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_track_id(&self, track_id: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE track_id = $1"
        ))
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding payment {}: {}", track_id, e);
            AppError::Database(format!("Failed to find payment: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Payment>, i64)> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting payments: {}", e);
                AppError::Database(format!("Failed to count payments: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
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
            error!("Database error listing payments: {}", e);
            AppError::Database(format!("Failed to list payments: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    id: i64,
    account_id: i64,
    track_id: String,
    amount: Decimal,
    currency: String,
    credits_requested: Decimal,
    status: String,
    tx_hash: Option<String>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            account_id: row.account_id,
            track_id: row.track_id,
            amount: row.amount,
            currency: row.currency,
            credits_requested: row.credits_requested,
            status: PaymentStatus::from_str(&row.status).unwrap_or(PaymentStatus::Pending),
            tx_hash: row.tx_hash,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
        }
    }
}
