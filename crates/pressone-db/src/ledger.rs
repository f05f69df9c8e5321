//! Transactional ledger over PostgreSQL
//!
//! A `PgLedgerTx` wraps one database transaction. Every row it reads is
//! locked with `SELECT ... FOR UPDATE`, so two reconciliations of the same
//! call or payment serialize at the database even across processes.
//! Dropping the value without `commit` rolls everything back.

use crate::repositories::call_repo::{CallRow, CALL_COLUMNS};
use crate::repositories::payment_repo::{PaymentRow, PAYMENT_COLUMNS};
use async_trait::async_trait;
use pressone_core::{
    models::{Call, CampaignDelta, CampaignStats, LedgerEntryKind, Payment},
    traits::{LedgerStore, LedgerTx},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

/// Opens ledger transactions on a connection pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> AppResult<PgLedgerTx> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        Ok(PgLedgerTx { tx })
    }
}

/// One open reconciliation transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl PgLedgerTx {
    async fn append_entry(
        &mut self,
        account_id: i64,
        kind: LedgerEntryKind,
        amount: Decimal,
        balance_after: Decimal,
        reference: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (account_id, kind, amount, balance_after, reference)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account_id)
        .bind(kind.to_string())
        .bind(amount)
        .bind(balance_after)
        .bind(reference)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to append {} entry for {}: {}", kind, reference, e);
            if crate::repositories::is_unique_violation(&e) {
                AppError::Conflict(format!("Ledger already has {} for {}", kind, reference))
            } else {
                AppError::Database(format!("Failed to append ledger entry: {}", e))
            }
        })?;

        Ok(())
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    #[instrument(skip(self))]
    async fn lock_call(&mut self, call_id: &str) -> AppResult<Option<Call>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            "SELECT {CALL_COLUMNS} FROM calls WHERE call_id = $1 FOR UPDATE"
        ))
        .bind(call_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to lock call {}: {}", call_id, e);
            AppError::Database(format!("Failed to lock call: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, call), fields(call_id = %call.call_id, state = %call.state))]
    async fn update_call(&mut self, call: &Call) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE calls
            SET state = $2,
                duration_seconds = $3,
                billed_cost = $4,
                hangup_cause = $5,
                ended_at = $6,
                updated_at = NOW()
            WHERE call_id = $1
            "#,
        )
        .bind(&call.call_id)
        .bind(call.state.as_str())
        .bind(call.duration_seconds)
        .bind(call.billed_cost)
        .bind(&call.hangup_cause)
        .bind(call.ended_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to update call {}: {}", call.call_id, e);
            AppError::Database(format!("Failed to update call: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self, delta))]
    async fn apply_campaign_delta(
        &mut self,
        campaign_id: i64,
        delta: &CampaignDelta,
    ) -> AppResult<CampaignStats> {
        let row = sqlx::query_as::<sqlx::Postgres, CampaignStatsRow>(
            r#"
            UPDATE campaigns
            SET completed = completed + $2,
                answered = answered + $3,
                failed = failed + $4,
                pressed_one = pressed_one + $5,
                actual_cost = actual_cost + $6
            WHERE id = $1
            RETURNING total_numbers, completed, answered, pressed_one, failed, actual_cost
            "#,
        )
        .bind(campaign_id)
        .bind(delta.completed)
        .bind(delta.answered)
        .bind(delta.failed)
        .bind(delta.pressed_one)
        .bind(delta.cost)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to update campaign {} counters: {}", campaign_id, e);
            AppError::Database(format!("Failed to update campaign counters: {}", e))
        })?
        .ok_or_else(|| AppError::CampaignNotFound(campaign_id.to_string()))?;

        debug!(
            "Campaign {} now at {}/{} completed",
            campaign_id, row.completed, row.total_numbers
        );

        Ok(CampaignStats {
            total_numbers: row.total_numbers,
            completed: row.completed,
            answered: row.answered,
            pressed_one: row.pressed_one,
            failed: row.failed,
            actual_cost: row.actual_cost,
        })
    }

    #[instrument(skip(self))]
    async fn complete_campaign_item(&mut self, item_id: i64, call_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_items
            SET status = 'completed'
            WHERE id = $1 AND call_id = $2 AND status <> 'completed'
            "#,
        )
        .bind(item_id)
        .bind(call_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to complete campaign item {}: {}", item_id, e);
            AppError::Database(format!("Failed to complete campaign item: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn complete_campaign_if_drained(&mut self, campaign_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'completed'
            WHERE id = $1
              AND status IN ('running', 'paused')
              AND NOT EXISTS (
                  SELECT 1 FROM campaign_items
                  WHERE campaign_id = $1 AND status <> 'completed'
              )
            "#,
        )
        .bind(campaign_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to complete campaign {}: {}", campaign_id, e);
            AppError::Database(format!("Failed to complete campaign: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn debit_for_call(
        &mut self,
        account_id: i64,
        call_id: &str,
        cost: Decimal,
    ) -> AppResult<Decimal> {
        let balance: (Decimal,) = sqlx::query_as(
            r#"
            UPDATE accounts
            SET credit_balance = credit_balance - $2,
                total_spent = total_spent + $2,
                total_calls = total_calls + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING credit_balance
            "#,
        )
        .bind(account_id)
        .bind(cost)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to debit account {}: {}", account_id, e);
            AppError::Database(format!("Failed to debit account: {}", e))
        })?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        self.append_entry(account_id, LedgerEntryKind::CallCharge, -cost, balance.0, call_id)
            .await?;

        Ok(balance.0)
    }

    #[instrument(skip(self))]
    async fn lock_payment(&mut self, track_id: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE track_id = $1 FOR UPDATE"
        ))
        .bind(track_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to lock payment {}: {}", track_id, e);
            AppError::Database(format!("Failed to lock payment: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn mark_payment_completed(
        &mut self,
        payment_id: i64,
        tx_hash: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'completed',
                tx_hash = COALESCE($2, tx_hash),
                confirmed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .bind(tx_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to complete payment {}: {}", payment_id, e);
            AppError::Database(format!("Failed to complete payment: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn credit_for_payment(
        &mut self,
        account_id: i64,
        track_id: &str,
        credits: Decimal,
    ) -> AppResult<Decimal> {
        let balance: (Decimal,) = sqlx::query_as(
            r#"
            UPDATE accounts
            SET credit_balance = credit_balance + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING credit_balance
            "#,
        )
        .bind(account_id)
        .bind(credits)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Failed to credit account {}: {}", account_id, e);
            AppError::Database(format!("Failed to credit account: {}", e))
        })?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        self.append_entry(account_id, LedgerEntryKind::PaymentCredit, credits, balance.0, track_id)
            .await?;

        Ok(balance.0)
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignStatsRow {
    total_numbers: i64,
    completed: i64,
    answered: i64,
    pressed_one: i64,
    failed: i64,
    actual_cost: Decimal,
}
