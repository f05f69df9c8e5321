//! Payment and credit package DTOs

use chrono::{DateTime, Utc};
use pressone_core::models::{CreditPackage, Payment, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Register a pending payment for a credit package
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentCreateRequest {
    /// Paying account; operators may omit it
    pub account_id: Option<i64>,

    #[validate(length(min = 1, max = 32, message = "Package code is required"))]
    pub package_code: String,

    /// Processor tracking id, generated when absent
    #[validate(length(min = 1, max = 128))]
    pub track_id: Option<String>,
}

/// Query parameters for listing payments
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFilterParams {
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: i64,
    pub account_id: i64,
    pub track_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub credits: Decimal,
    pub status: PaymentStatus,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            account_id: p.account_id,
            track_id: p.track_id,
            amount: p.amount,
            currency: p.currency,
            credits: p.credits_requested,
            status: p.status,
            tx_hash: p.tx_hash,
            created_at: p.created_at,
            confirmed_at: p.confirmed_at,
        }
    }
}

/// Create or replace a credit package
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreditPackageRequest {
    #[validate(custom(function = "validate_positive"))]
    pub credits: Decimal,

    #[validate(custom(function = "validate_positive"))]
    pub price: Decimal,

    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 8))]
    pub currency: String,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_currency() -> String {
    "USDT".to_string()
}

fn default_active() -> bool {
    true
}

fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

impl CreditPackageRequest {
    pub fn into_package(self, code: &str) -> CreditPackage {
        CreditPackage {
            code: code.trim().to_string(),
            credits: self.credits,
            price: self.price,
            currency: self.currency.to_uppercase(),
            active: self.active,
        }
    }
}

/// Query parameters for the package catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditPackageFilterParams {
    /// Admins may list deactivated packages too
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditPackageResponse {
    pub code: String,
    pub credits: Decimal,
    pub price: Decimal,
    pub currency: String,
    pub unit_price: Decimal,
    pub active: bool,
}

impl From<CreditPackage> for CreditPackageResponse {
    fn from(p: CreditPackage) -> Self {
        let unit_price = p.unit_price();
        Self {
            code: p.code,
            credits: p.credits,
            price: p.price,
            currency: p.currency,
            unit_price,
            active: p.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_package_request_validation() {
        let req: CreditPackageRequest =
            serde_json::from_str(r#"{"credits": "50", "price": "20"}"#).unwrap();
        assert!(req.validate().is_ok());
        let package = req.into_package(" 50 ");
        assert_eq!(package.code, "50");
        assert_eq!(package.currency, "USDT");
        assert!(package.active);

        let req: CreditPackageRequest =
            serde_json::from_str(r#"{"credits": "0", "price": "20"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_package_response_unit_price() {
        let response = CreditPackageResponse::from(CreditPackage {
            code: "100".to_string(),
            credits: dec!(100),
            price: dec!(35),
            currency: "USDT".to_string(),
            active: true,
        });
        assert_eq!(response.unit_price, dec!(0.35));
    }
}
