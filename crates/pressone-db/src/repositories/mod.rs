//! Repository implementations
//!
//! Concrete implementations of the repository traits defined in
//! pressone-core, using sqlx for PostgreSQL access.

pub mod account_repo;
pub mod call_repo;
pub mod campaign_repo;
pub mod credit_package_repo;
pub mod payment_repo;
pub mod stats_repo;
pub mod trunk_repo;

pub use account_repo::PgAccountRepository;
pub use call_repo::PgCallRepository;
pub use campaign_repo::PgCampaignRepository;
pub use credit_package_repo::PgCreditPackageRepository;
pub use payment_repo::PgPaymentRepository;
pub use stats_repo::{GlobalStats, PgStatsRepository};
pub use trunk_repo::PgTrunkRepository;

/// Duplicate key on insert
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Insert pointing at a missing parent row
pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}
