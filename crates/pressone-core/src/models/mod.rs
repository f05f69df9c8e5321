//! Domain models for PressOne
//!
//! Core domain models shared by the engine crates.

pub mod account;
pub mod call;
pub mod campaign;
pub mod event;
pub mod ledger;
pub mod payment;
pub mod trunk;

pub use account::{validate_caller_id, Account};
pub use call::{
    is_valid_destination, normalize_number, validate_channel_variable, Call, CallState,
    HangupOutcome, NewCall,
};
pub use campaign::{
    Campaign, CampaignDelta, CampaignItem, CampaignItemStatus, CampaignStats, CampaignStatus,
    NewCampaign,
};
pub use event::{DtmfEvent, HangupEvent, PaymentEvent, ReconcileOutcome};
pub use ledger::{LedgerEntry, LedgerEntryKind, LedgerEvent};
pub use payment::{CreditPackage, NewPayment, Payment, PaymentSignal, PaymentStatus};
pub use trunk::{TrunkIdentity, TrunkStatus};
