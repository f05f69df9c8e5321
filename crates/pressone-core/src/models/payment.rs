//! Payment and credit package models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// What a processor callback status means for the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSignal {
    /// Funds arrived; credit the account
    Credit,
    /// Terminal failure reported by the processor
    Failed,
    /// Intermediate or unrecognised status
    Other,
}

impl PaymentSignal {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "paid" | "confirmed" | "completed" | "complete" => PaymentSignal::Credit,
            "failed" | "expired" | "canceled" | "cancelled" => PaymentSignal::Failed,
            _ => PaymentSignal::Other,
        }
    }
}

/// Payment entity, one per purchase attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub account_id: i64,
    /// Processor idempotency key
    pub track_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub credits_requested: Decimal,
    pub status: PaymentStatus,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            id: 0,
            account_id: 0,
            track_id: String::new(),
            amount: Decimal::ZERO,
            currency: "USDT".to_string(),
            credits_requested: Decimal::ZERO,
            status: PaymentStatus::Pending,
            tx_hash: None,
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

/// Data needed to register a pending payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub account_id: i64,
    pub track_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub credits_requested: Decimal,
}

/// Purchasable bundle of credits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    pub code: String,
    pub credits: Decimal,
    pub price: Decimal,
    pub currency: String,
    pub active: bool,
}

impl CreditPackage {
    /// Catalog seeded on first install
    pub fn defaults() -> Vec<CreditPackage> {
        [(10, 5), (50, 20), (100, 35), (500, 150)]
            .into_iter()
            .map(|(credits, price)| CreditPackage {
                code: credits.to_string(),
                credits: Decimal::from(credits),
                price: Decimal::from(price),
                currency: "USDT".to_string(),
                active: true,
            })
            .collect()
    }

    /// Price of a single credit in this package
    pub fn unit_price(&self) -> Decimal {
        if self.credits.is_zero() {
            return Decimal::ZERO;
        }
        (self.price / self.credits).round_dp(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_signal() {
        assert_eq!(PaymentSignal::from_status("paid"), PaymentSignal::Credit);
        assert_eq!(PaymentSignal::from_status("Confirmed"), PaymentSignal::Credit);
        assert_eq!(PaymentSignal::from_status("completed"), PaymentSignal::Credit);
        assert_eq!(PaymentSignal::from_status("expired"), PaymentSignal::Failed);
        assert_eq!(PaymentSignal::from_status("Waiting"), PaymentSignal::Other);
    }

    #[test]
    fn test_default_packages() {
        let packages = CreditPackage::defaults();
        assert_eq!(packages.len(), 4);
        assert_eq!(packages[0].code, "10");
        assert_eq!(packages[0].price, dec!(5));
        assert_eq!(packages[3].credits, dec!(500));
        assert_eq!(packages[3].unit_price(), dec!(0.3));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(PaymentStatus::from_str("PENDING"), Some(PaymentStatus::Pending));
        assert_eq!(PaymentStatus::from_str("refunded"), None);
    }
}
