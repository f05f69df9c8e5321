//! Unified error handling for PressOne
//!
//! A single error type covers every failure the engine can report, with
//! automatic HTTP response mapping for the API layer.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    // ==================== Business Logic Errors ====================
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Trunk not found: {0}")]
    TrunkNotFound(String),

    #[error("Trunk unavailable: {0}")]
    TrunkUnavailable(String),

    #[error("Credit package not found: {0}")]
    PackageNotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid destination number: {0}")]
    InvalidDestination(String),

    #[error("Invalid caller id: {0}")]
    InvalidCallerId(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ==================== Telephony Switch Errors ====================
    #[error("Switch unavailable: {0}")]
    SwitchUnavailable(String),

    #[error("Switch protocol error: {0}")]
    SwitchProtocol(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::InvalidDestination(_)
            | AppError::InvalidCallerId(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 402 Payment Required
            AppError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::AccountNotFound(_)
            | AppError::CallNotFound(_)
            | AppError::CampaignNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::TrunkNotFound(_)
            | AppError::PackageNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_)
            | AppError::AlreadyExists(_)
            | AppError::InvalidStateTransition(_)
            | AppError::TrunkUnavailable(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway
            AppError::SwitchProtocol(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::SwitchUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Migration(_) => "migration_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::AccountNotFound(_) => "account_not_found",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::CallNotFound(_) => "call_not_found",
            AppError::CampaignNotFound(_) => "campaign_not_found",
            AppError::PaymentNotFound(_) => "payment_not_found",
            AppError::TrunkNotFound(_) => "trunk_not_found",
            AppError::TrunkUnavailable(_) => "trunk_unavailable",
            AppError::PackageNotFound(_) => "package_not_found",
            AppError::InvalidStateTransition(_) => "invalid_state_transition",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::InvalidDestination(_) => "invalid_destination",
            AppError::InvalidCallerId(_) => "invalid_caller_id",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::SwitchUnavailable(_) => "switch_unavailable",
            AppError::SwitchProtocol(_) => "switch_protocol_error",
        }
    }

    /// Whether the caller may safely retry the operation later.
    ///
    /// Persistence failures roll back the whole unit of work, so redelivery
    /// of the same event is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::SwitchUnavailable(_)
                | AppError::Database(_)
                | AppError::Pool(_)
                | AppError::Transaction(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}
