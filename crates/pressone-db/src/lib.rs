//! PressOne Database Layer
//!
//! PostgreSQL access for the PressOne engine:
//!
//! - Connection pool management and embedded migrations
//! - Repository implementations for calls, campaigns, accounts, trunks,
//!   payments and credit packages
//! - `PgLedgerStore`, the transactional unit of work used by the reconciler
//!   (`SELECT ... FOR UPDATE` on every row it touches)

pub mod ledger;
pub mod pool;
pub mod repositories;

pub use ledger::{PgLedgerStore, PgLedgerTx};
pub use pool::{create_pool, create_pool_from_config, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use pressone_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
