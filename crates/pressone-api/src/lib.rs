//! API layer for PressOne
//!
//! HTTP handlers for the switch and payment-processor webhooks, campaign
//! control, balances, payments, credit packages and the ledger websocket.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod dto;
pub mod handlers;

use pressone_db::PgLedgerStore;
use pressone_services::{CampaignDispatcher, OriginationGateway};

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

pub use handlers::{
    configure_accounts, configure_calls, configure_campaigns, configure_credit_packages,
    configure_payments, configure_stats, configure_webhooks, json_config, ws_handler,
};

/// Dispatcher wired to the PostgreSQL ledger
pub type Dispatcher = CampaignDispatcher<PgLedgerStore>;

/// Origination gateway wired to the PostgreSQL ledger
pub type Gateway = OriginationGateway<PgLedgerStore>;
