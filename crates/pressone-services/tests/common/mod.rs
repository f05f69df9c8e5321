//! In-memory ledger store and scripted switch shared by the service tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex as SyncMutex;
use pressone_core::{
    config::{BillingConfig, DialerConfig},
    models::{
        Account, Call, CallState, Campaign, CampaignDelta, CampaignItem, CampaignItemStatus,
        CampaignStats, CampaignStatus, LedgerEntryKind, NewCall, NewCampaign, Payment,
        PaymentStatus, TrunkIdentity, TrunkStatus,
    },
    traits::{
        AccountRepository, CallRepository, CampaignRepository, LedgerStore, LedgerTx,
        OriginateCommand, OriginateOutcome, SwitchClient, TrunkRepository,
    },
    AppError, AppResult, BillingCalculator,
};
use pressone_services::{CampaignDispatcher, KeyedLocks, Notifier, OriginationGateway, Reconciler};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
pub struct Entry {
    pub account_id: i64,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub reference: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub calls: HashMap<String, Call>,
    pub campaigns: HashMap<i64, Campaign>,
    pub items: HashMap<i64, CampaignItem>,
    pub accounts: HashMap<i64, Account>,
    pub trunks: HashMap<i64, TrunkIdentity>,
    pub payments: HashMap<String, Payment>,
    pub entries: Vec<Entry>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Ledger store whose transactions work on a private copy of the state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Make the next commit fail, as a dropped database connection would
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub async fn add_account(&self, id: i64, balance: Decimal) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(id);
        state.accounts.insert(
            id,
            Account {
                id,
                name: format!("operator-{}", id),
                caller_id: Some("15550001111".to_string()),
                credit_balance: balance,
                ..Default::default()
            },
        );
    }

    pub async fn add_trunk(&self, id: i64, account_id: i64, max_channels: i32, status: TrunkStatus) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(id);
        state.trunks.insert(
            id,
            TrunkIdentity {
                id,
                account_id,
                name: format!("trunk-{}", id),
                endpoint: format!("acct{}_trunk", account_id),
                max_channels,
                status,
            },
        );
    }

    pub async fn add_payment(&self, account_id: i64, track_id: &str, credits: Decimal) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.payments.insert(
            track_id.to_string(),
            Payment {
                id,
                account_id,
                track_id: track_id.to_string(),
                amount: credits / Decimal::from(2),
                credits_requested: credits,
                ..Default::default()
            },
        );
    }

    /// Pretend the call was created `secs` seconds ago
    pub async fn age_call(&self, call_id: &str, secs: i64) {
        if let Some(call) = self.state.lock().await.calls.get_mut(call_id) {
            call.created_at = Utc::now() - Duration::seconds(secs);
        }
    }

    pub async fn call(&self, call_id: &str) -> Call {
        self.state.lock().await.calls[call_id].clone()
    }

    pub async fn campaign(&self, id: i64) -> Campaign {
        self.state.lock().await.campaigns[&id].clone()
    }

    pub async fn account(&self, id: i64) -> Account {
        self.state.lock().await.accounts[&id].clone()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            fail_commit: Arc::clone(&self.fail_commit),
        })
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_call(&mut self, call_id: &str) -> AppResult<Option<Call>> {
        Ok(self.working.calls.get(call_id).cloned())
    }

    async fn update_call(&mut self, call: &Call) -> AppResult<()> {
        let mut call = call.clone();
        call.updated_at = Utc::now();
        self.working.calls.insert(call.call_id.clone(), call);
        Ok(())
    }

    async fn apply_campaign_delta(
        &mut self,
        campaign_id: i64,
        delta: &CampaignDelta,
    ) -> AppResult<CampaignStats> {
        let campaign = self
            .working
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| AppError::CampaignNotFound(campaign_id.to_string()))?;
        campaign.stats.apply(delta);

        let stats = &campaign.stats;
        if stats.completed != stats.answered + stats.failed
            || stats.pressed_one > stats.answered
            || stats.completed > stats.total_numbers
        {
            return Err(AppError::Database(
                "campaign_counters_consistent violated".to_string(),
            ));
        }
        Ok(stats.clone())
    }

    async fn complete_campaign_item(&mut self, item_id: i64, call_id: &str) -> AppResult<bool> {
        match self.working.items.get_mut(&item_id) {
            Some(item)
                if item.call_id.as_deref() == Some(call_id)
                    && item.status != CampaignItemStatus::Completed =>
            {
                item.status = CampaignItemStatus::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_campaign_if_drained(&mut self, campaign_id: i64) -> AppResult<bool> {
        let open = self
            .working
            .items
            .values()
            .any(|i| i.campaign_id == campaign_id && i.status != CampaignItemStatus::Completed);
        match self.working.campaigns.get_mut(&campaign_id) {
            Some(campaign)
                if !open
                    && matches!(
                        campaign.status,
                        CampaignStatus::Running | CampaignStatus::Paused
                    ) =>
            {
                campaign.status = CampaignStatus::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn debit_for_call(
        &mut self,
        account_id: i64,
        call_id: &str,
        cost: Decimal,
    ) -> AppResult<Decimal> {
        self.append(account_id, LedgerEntryKind::CallCharge, -cost, call_id)?;
        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;
        account.credit_balance -= cost;
        account.total_spent += cost;
        account.total_calls += 1;
        Ok(account.credit_balance)
    }

    async fn lock_payment(&mut self, track_id: &str) -> AppResult<Option<Payment>> {
        Ok(self.working.payments.get(track_id).cloned())
    }

    async fn mark_payment_completed(
        &mut self,
        payment_id: i64,
        tx_hash: Option<&str>,
    ) -> AppResult<()> {
        let payment = self
            .working
            .payments
            .values_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| AppError::PaymentNotFound(payment_id.to_string()))?;
        payment.status = PaymentStatus::Completed;
        payment.tx_hash = tx_hash.map(str::to_string);
        payment.confirmed_at = Some(Utc::now());
        Ok(())
    }

    async fn credit_for_payment(
        &mut self,
        account_id: i64,
        track_id: &str,
        credits: Decimal,
    ) -> AppResult<Decimal> {
        self.append(account_id, LedgerEntryKind::PaymentCredit, credits, track_id)?;
        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;
        account.credit_balance += credits;
        Ok(account.credit_balance)
    }

    async fn commit(mut self) -> AppResult<()> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Transaction("connection reset".to_string()));
        }
        *self.guard = self.working;
        Ok(())
    }
}

impl MemoryTx {
    fn append(
        &mut self,
        account_id: i64,
        kind: LedgerEntryKind,
        amount: Decimal,
        reference: &str,
    ) -> AppResult<()> {
        if self
            .working
            .entries
            .iter()
            .any(|e| e.kind == kind && e.reference == reference)
        {
            return Err(AppError::Conflict(format!(
                "{} already recorded for {}",
                kind, reference
            )));
        }
        self.working.entries.push(Entry {
            account_id,
            kind,
            amount,
            reference: reference.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl CallRepository for MemoryStore {
    async fn create_queued(&self, call: &NewCall) -> AppResult<Call> {
        let mut state = self.state.lock().await;
        let record = Call {
            call_id: call.call_id.clone(),
            campaign_id: call.campaign_id,
            campaign_item_id: call.campaign_item_id,
            account_id: call.account_id,
            trunk_id: call.trunk_id,
            destination: call.destination.clone(),
            caller_id: call.caller_id.clone(),
            ..Default::default()
        };
        if let Some(item) = call.campaign_item_id.and_then(|id| state.items.get_mut(&id)) {
            item.call_id = Some(call.call_id.clone());
        }
        state.calls.insert(record.call_id.clone(), record.clone());
        Ok(record)
    }

    async fn mark_originating(&self, call_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.calls.get_mut(call_id) {
            Some(call) if call.state == CallState::Queued => {
                call.state = CallState::Originating;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_call_id(&self, call_id: &str) -> AppResult<Option<Call>> {
        Ok(self.state.lock().await.calls.get(call_id).cloned())
    }

    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Call>, i64)> {
        let state = self.state.lock().await;
        let mut calls: Vec<Call> = state
            .calls
            .values()
            .filter(|c| c.campaign_id == Some(campaign_id))
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = calls.len() as i64;
        let page = calls
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_stale(&self, older_than_secs: i64, limit: i64) -> AppResult<Vec<Call>> {
        let cutoff = Utc::now() - Duration::seconds(older_than_secs);
        let state = self.state.lock().await;
        Ok(state
            .calls
            .values()
            .filter(|c| c.state.is_pending() && !c.is_settled() && c.created_at < cutoff)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Campaign>> {
        Ok(self.state.lock().await.campaigns.get(&id).cloned())
    }

    async fn create(&self, campaign: &NewCampaign) -> AppResult<Campaign> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let record = Campaign {
            id,
            account_id: campaign.account_id,
            name: campaign.name.clone(),
            trunk_id: campaign.trunk_id,
            caller_id: campaign.caller_id.clone(),
            cps: campaign.cps,
            max_concurrent: campaign.max_concurrent,
            ..Default::default()
        };
        state.campaigns.insert(id, record.clone());
        Ok(record)
    }

    async fn add_items(&self, campaign_id: i64, numbers: &[String]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        if !state.campaigns.contains_key(&campaign_id) {
            return Err(AppError::CampaignNotFound(campaign_id.to_string()));
        }
        for number in numbers {
            let id = state.next_id();
            state.items.insert(
                id,
                CampaignItem {
                    id,
                    campaign_id,
                    phone_number: number.clone(),
                    status: CampaignItemStatus::Pending,
                    call_id: None,
                },
            );
        }
        if let Some(campaign) = state.campaigns.get_mut(&campaign_id) {
            campaign.stats.total_numbers += numbers.len() as i64;
        }
        Ok(numbers.len() as u64)
    }

    async fn set_status(&self, id: i64, status: CampaignStatus) -> AppResult<Campaign> {
        let mut state = self.state.lock().await;
        let campaign = state
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| AppError::CampaignNotFound(id.to_string()))?;
        campaign.status = status;
        if status == CampaignStatus::Running && campaign.started_at.is_none() {
            campaign.started_at = Some(Utc::now());
        }
        Ok(campaign.clone())
    }

    async fn claim_next_item(&self, campaign_id: i64) -> AppResult<Option<CampaignItem>> {
        let mut state = self.state.lock().await;
        let next = state
            .items
            .values_mut()
            .filter(|i| i.campaign_id == campaign_id && i.status == CampaignItemStatus::Pending)
            .min_by_key(|i| i.id);
        Ok(next.map(|item| {
            item.status = CampaignItemStatus::Dialing;
            item.clone()
        }))
    }

    async fn release_item(&self, item_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(item) = state.items.get_mut(&item_id) {
            if item.status == CampaignItemStatus::Dialing {
                item.status = CampaignItemStatus::Pending;
                item.call_id = None;
            }
        }
        Ok(())
    }

    async fn open_item_count(&self, campaign_id: i64) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|i| i.campaign_id == campaign_id && i.status != CampaignItemStatus::Completed)
            .count() as i64)
    }

    async fn complete_if_drained(&self, campaign_id: i64) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let open = state
            .items
            .values()
            .any(|i| i.campaign_id == campaign_id && i.status != CampaignItemStatus::Completed);
        match state.campaigns.get_mut(&campaign_id) {
            Some(c) if c.status == CampaignStatus::Running && !open => {
                c.status = CampaignStatus::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_running(&self) -> AppResult<Vec<Campaign>> {
        let state = self.state.lock().await;
        Ok(state
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Running)
            .cloned()
            .collect())
    }

    async fn list_by_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Campaign>, i64)> {
        let state = self.state.lock().await;
        let mut campaigns: Vec<Campaign> = state
            .campaigns
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect();
        campaigns.sort_by_key(|c| std::cmp::Reverse(c.id));
        let total = campaigns.len() as i64;
        Ok((
            campaigns
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
            total,
        ))
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }
}

#[async_trait]
impl TrunkRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<TrunkIdentity>> {
        Ok(self.state.lock().await.trunks.get(&id).cloned())
    }

    async fn list_for_account(&self, account_id: i64) -> AppResult<Vec<TrunkIdentity>> {
        let state = self.state.lock().await;
        Ok(state
            .trunks
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }
}

/// Switch that answers from a script, then accepts everything
#[derive(Default)]
pub struct ScriptedSwitch {
    script: SyncMutex<VecDeque<AppResult<OriginateOutcome>>>,
    sent: SyncMutex<Vec<OriginateCommand>>,
}

impl ScriptedSwitch {
    pub fn push(&self, reply: AppResult<OriginateOutcome>) {
        self.script.lock().push_back(reply);
    }

    pub fn sent(&self) -> Vec<OriginateCommand> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SwitchClient for ScriptedSwitch {
    async fn originate(&self, command: &OriginateCommand) -> AppResult<OriginateOutcome> {
        self.sent.lock().push(command.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Ok(OriginateOutcome::Accepted))
    }
}

/// Services wired to one memory store: account 1 (balance 10) with trunk 1
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub switch: Arc<ScriptedSwitch>,
    pub notifier: Notifier,
    pub reconciler: Arc<Reconciler<MemoryStore>>,
    pub gateway: Arc<OriginationGateway<MemoryStore>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_billing(BillingConfig::default()).await
    }

    pub async fn with_billing(billing: BillingConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        store.add_account(1, Decimal::from(10)).await;
        store.add_trunk(2, 1, 4, TrunkStatus::Active).await;

        let switch = Arc::new(ScriptedSwitch::default());
        let notifier = Notifier::new(256);
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            BillingCalculator::from_config(&billing),
            KeyedLocks::new(8),
            notifier.clone(),
        ));
        let gateway = Arc::new(OriginationGateway::new(
            switch.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::clone(&reconciler),
            billing,
            DialerConfig::default().default_caller_id,
        ));

        Self {
            store,
            switch,
            notifier,
            reconciler,
            gateway,
        }
    }

    pub const ACCOUNT: i64 = 1;
    pub const TRUNK: i64 = 2;

    /// Campaign on the default trunk with `numbers` pending items
    pub async fn campaign(&self, numbers: &[&str]) -> Campaign {
        self.campaign_on(Self::TRUNK, numbers).await
    }

    pub async fn campaign_on(&self, trunk_id: i64, numbers: &[&str]) -> Campaign {
        let campaign = CampaignRepository::create(
            self.store.as_ref(),
            &NewCampaign {
                account_id: Self::ACCOUNT,
                name: "spring promo".to_string(),
                trunk_id: Some(trunk_id),
                caller_id: None,
                cps: 50,
                max_concurrent: 10,
            },
        )
        .await
        .unwrap();
        let numbers: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        self.store.add_items(campaign.id, &numbers).await.unwrap();
        self.store.campaign(campaign.id).await
    }

    pub fn dispatcher(&self) -> Arc<CampaignDispatcher<MemoryStore>> {
        Arc::new(CampaignDispatcher::new(
            Arc::clone(&self.gateway),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            DialerConfig::default(),
        ))
    }

    /// Claim the campaign's next item and originate it; returns the call id
    pub async fn dial_next(&self, campaign_id: i64) -> String {
        let item = self
            .store
            .claim_next_item(campaign_id)
            .await
            .unwrap()
            .expect("pending item");
        let result = self
            .gateway
            .originate(pressone_services::OriginateRequest {
                account_id: Self::ACCOUNT,
                campaign_id: Some(campaign_id),
                campaign_item_id: Some(item.id),
                trunk_id: Self::TRUNK,
                destination: item.phone_number,
                ..Default::default()
            })
            .await
            .unwrap();
        result.call_id
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

pub fn hangup(call_id: &str, duration: i32, cause: &str) -> pressone_core::models::HangupEvent {
    pressone_core::models::HangupEvent {
        call_id: call_id.to_string(),
        duration_seconds: duration,
        hangup_cause: cause.to_string(),
        campaign_id: None,
        campaign_item_id: None,
    }
}

pub fn dtmf(call_id: &str, digit: &str) -> pressone_core::models::DtmfEvent {
    pressone_core::models::DtmfEvent {
        call_id: call_id.to_string(),
        digit: digit.to_string(),
        duration_seconds: None,
        hangup_cause: None,
        campaign_id: None,
        campaign_item_id: None,
    }
}
