//! Business logic services for PressOne
//!
//! Everything between the HTTP/switch edges and the ledger store:
//!
//! - `Reconciler` - applies terminal call events and payment confirmations
//!   exactly once, inside one ledger transaction per event
//! - `EventIngestor` - classifies DTMF, hangup and payment callbacks and
//!   forwards them to the reconciler
//! - `OriginationGateway` - validates a dial request and hands it to the switch
//! - `CampaignDispatcher` - paces a running campaign's originations
//! - `StaleCallSweeper` - fails calls the switch never reported back on
//! - `Notifier` - broadcast of committed ledger changes
//!
//! # Architecture
//!
//! Services are generic over the `LedgerStore` and hold repositories as
//! trait objects, so the whole engine runs against PostgreSQL in production
//! and an in-memory store in tests.

pub mod dispatcher;
pub mod ingestion;
pub mod keyed_lock;
pub mod notifier;
pub mod origination;
pub mod reconciler;
pub mod sweeper;

pub use dispatcher::CampaignDispatcher;
pub use ingestion::{EventIngestion, EventIngestor};
pub use keyed_lock::KeyedLocks;
pub use notifier::Notifier;
pub use origination::{OriginateRequest, OriginateResult, OriginationGateway};
pub use reconciler::Reconciler;
pub use sweeper::StaleCallSweeper;

/// Business logic constants
pub mod constants {
    /// Channel variable carrying the correlation id
    pub const VAR_CALL_ID: &str = "PRESSONE_CALL_ID";

    /// Channel variable carrying the campaign id
    pub const VAR_CAMPAIGN_ID: &str = "PRESSONE_CAMPAIGN_ID";

    /// Channel variable carrying the campaign item id
    pub const VAR_ITEM_ID: &str = "PRESSONE_ITEM_ID";

    /// Hangup cause recorded on calls the switch never reported back on
    pub const CAUSE_ORIGINATE_TIMEOUT: &str = "ORIGINATE_TIMEOUT";

    /// Hangup cause recorded when the destination fails local validation
    pub const CAUSE_INVALID_DESTINATION: &str = "INVALID_DESTINATION";

    /// Buffered ledger notifications per subscriber
    pub const NOTIFY_CAPACITY: usize = 1024;

    /// Stale calls failed per sweep
    pub const SWEEP_BATCH: i64 = 500;

    /// Wait before retrying after the switch was unreachable
    pub const DISPATCH_BACKOFF_SECS: u64 = 5;

    /// Poll interval while a drained campaign waits for in-flight calls
    pub const DRAIN_POLL_SECS: u64 = 2;
}
