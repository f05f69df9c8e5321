//! PressOne Core Library
//!
//! Foundational types for the press-1 call lifecycle and billing engine:
//!
//! - Domain models (Call, Campaign, Account, Payment, TrunkIdentity, ...)
//! - The billing calculator that turns a call duration into a cost
//! - Repository, ledger and switch traits implemented by the outer crates
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod billing;
pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use billing::BillingCalculator;
pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
