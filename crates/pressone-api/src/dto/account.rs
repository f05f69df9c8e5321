//! Account DTOs

use chrono::{DateTime, Utc};
use pressone_core::models::Account;
use rust_decimal::Decimal;
use serde::Serialize;

/// Balance view of an account
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub account_id: i64,
    pub name: String,
    pub credit_balance: Decimal,
    pub total_spent: Decimal,
    pub total_calls: i64,
    /// Balance fell below zero after post-call reconciliation
    pub has_deficit: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for BalanceResponse {
    fn from(account: Account) -> Self {
        let has_deficit = account.has_deficit();
        Self {
            account_id: account.id,
            name: account.name,
            credit_balance: account.credit_balance,
            total_spent: account.total_spent,
            total_calls: account.total_calls,
            has_deficit,
            updated_at: account.updated_at,
        }
    }
}
