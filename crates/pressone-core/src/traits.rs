//! Common traits for persistence and the telephony switch
//!
//! The reconciler talks to storage only through `LedgerStore`/`LedgerTx`,
//! one atomic unit of work per event. Everything else goes through the
//! plain repository traits.

use crate::error::AppError;
use crate::models::{
    Account, Call, Campaign, CampaignDelta, CampaignItem, CampaignStats, CampaignStatus,
    CreditPackage, NewCall, NewCampaign, NewPayment, Payment, TrunkIdentity,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Call repository
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Insert a call in QUEUED state and link it to its campaign item
    async fn create_queued(&self, call: &NewCall) -> Result<Call, AppError>;

    /// QUEUED → ORIGINATING; returns false if the call was not QUEUED
    async fn mark_originating(&self, call_id: &str) -> Result<bool, AppError>;

    /// Find call by correlation id
    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<Call>, AppError>;

    /// Most recent calls of a campaign, newest first, with the total count
    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Call>, i64), AppError>;

    /// Unsettled QUEUED/ORIGINATING calls older than `older_than_secs`
    async fn find_stale(&self, older_than_secs: i64, limit: i64) -> Result<Vec<Call>, AppError>;
}

/// Campaign repository
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError>;

    async fn create(&self, campaign: &NewCampaign) -> Result<Campaign, AppError>;

    /// Append destination numbers; bumps `total_numbers`
    async fn add_items(&self, campaign_id: i64, numbers: &[String]) -> Result<u64, AppError>;

    async fn set_status(&self, id: i64, status: CampaignStatus) -> Result<Campaign, AppError>;

    /// Take the next pending item and mark it dialing, skipping rows locked by other dialers
    async fn claim_next_item(&self, campaign_id: i64) -> Result<Option<CampaignItem>, AppError>;

    /// Put a dialing item back to pending
    async fn release_item(&self, item_id: i64) -> Result<(), AppError>;

    /// Items not yet completed (pending or dialing)
    async fn open_item_count(&self, campaign_id: i64) -> Result<i64, AppError>;

    /// running → completed once every item is completed; returns true if it flipped
    async fn complete_if_drained(&self, campaign_id: i64) -> Result<bool, AppError>;

    /// Campaigns currently in `running` state
    async fn list_running(&self) -> Result<Vec<Campaign>, AppError>;

    async fn list_by_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Campaign>, i64), AppError>;
}

/// Account repository (read side; balances are written by the ledger)
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError>;
}

/// Trunk identity lookup table
#[async_trait]
pub trait TrunkRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<TrunkIdentity>, AppError>;

    async fn list_for_account(&self, account_id: i64) -> Result<Vec<TrunkIdentity>, AppError>;
}

/// Payment repository
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Register a pending payment; fails with `AlreadyExists` on a duplicate `track_id`
    async fn create_pending(&self, payment: &NewPayment) -> Result<Payment, AppError>;

    async fn find_by_track_id(&self, track_id: &str) -> Result<Option<Payment>, AppError>;

    async fn list_by_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), AppError>;
}

/// Persisted credit package catalog
#[async_trait]
pub trait CreditPackageRepository: Send + Sync {
    async fn list(&self, include_inactive: bool) -> Result<Vec<CreditPackage>, AppError>;

    async fn find(&self, code: &str) -> Result<Option<CreditPackage>, AppError>;

    /// Insert or replace a package inside one transaction
    async fn upsert(&self, package: &CreditPackage) -> Result<CreditPackage, AppError>;

    /// Hide a package from purchase; returns false if it does not exist
    async fn deactivate(&self, code: &str) -> Result<bool, AppError>;
}

/// Source of atomic reconciliation units
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Open a unit of work. Dropping it without `commit` discards every write.
    async fn begin(&self) -> Result<Self::Tx, AppError>;
}

/// One atomic, isolated unit of work over calls, campaigns, accounts and payments.
///
/// Implementations lock rows as they are read. Callers acquire locks in the
/// order call → campaign → account, or payment → account.
#[async_trait]
pub trait LedgerTx: Send + Sized {
    /// Read and lock a call
    async fn lock_call(&mut self, call_id: &str) -> Result<Option<Call>, AppError>;

    /// Persist state, duration, cause, cost and end time of a locked call
    async fn update_call(&mut self, call: &Call) -> Result<(), AppError>;

    /// Add a settled call's delta to the campaign counters
    async fn apply_campaign_delta(
        &mut self,
        campaign_id: i64,
        delta: &CampaignDelta,
    ) -> Result<CampaignStats, AppError>;

    /// Mark an item completed if it is still linked to `call_id`.
    ///
    /// Returns false when the item was released and re-dialed under another
    /// call; the settling call then only adds its cost to the campaign.
    async fn complete_campaign_item(&mut self, item_id: i64, call_id: &str)
        -> Result<bool, AppError>;

    /// running|paused → completed once no item is open; returns true if it flipped
    async fn complete_campaign_if_drained(&mut self, campaign_id: i64) -> Result<bool, AppError>;

    /// Debit `cost`, bump spend and call counters, record a `call_charge` entry.
    /// Returns the new balance.
    async fn debit_for_call(
        &mut self,
        account_id: i64,
        call_id: &str,
        cost: Decimal,
    ) -> Result<Decimal, AppError>;

    /// Read and lock a payment
    async fn lock_payment(&mut self, track_id: &str) -> Result<Option<Payment>, AppError>;

    async fn mark_payment_completed(
        &mut self,
        payment_id: i64,
        tx_hash: Option<&str>,
    ) -> Result<(), AppError>;

    /// Credit `credits`, record a `payment_credit` entry. Returns the new balance.
    async fn credit_for_payment(
        &mut self,
        account_id: i64,
        track_id: &str,
        credits: Decimal,
    ) -> Result<Decimal, AppError>;

    async fn commit(self) -> Result<(), AppError>;
}

/// Origination request handed to the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginateCommand {
    /// Correlation id; the switch must echo it on every later event
    pub call_id: String,
    pub destination: String,
    /// Trunk endpoint resolved from the trunk table
    pub endpoint: String,
    pub caller_id: Option<String>,
    pub variables: BTreeMap<String, String>,
}

/// Switch verdict on an origination request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginateOutcome {
    Accepted,
    Rejected { reason: String },
}

/// Telephony switch client
///
/// Transport failures surface as `AppError::SwitchUnavailable`; a refusal by
/// the switch is a normal `Rejected` outcome.
#[async_trait]
pub trait SwitchClient: Send + Sync {
    async fn originate(&self, command: &OriginateCommand) -> Result<OriginateOutcome, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);

        let p = Pagination::new(0, 2000);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        assert_eq!(PaginationMeta::new(95, 1, 10).total_pages, 10);
        assert_eq!(PaginationMeta::new(101, 1, 10).total_pages, 11);
        assert_eq!(PaginationMeta::new(0, 1, 10).total_pages, 0);
    }
}
