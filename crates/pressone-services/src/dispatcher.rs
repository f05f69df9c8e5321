//! Campaign dispatcher
//!
//! One tokio task per running campaign. The task claims pending items,
//! waits for a free channel and paces originations at the campaign's CPS.
//! A channel is held from origination until the reconciler publishes
//! `CallSettled` for that call.
//!
//! Pausing cancels the task; calls already in flight keep reconciling.

use parking_lot::Mutex;
use pressone_core::{
    config::DialerConfig,
    models::{Campaign, CampaignItem, CampaignStatus, LedgerEvent},
    traits::{CallRepository, CampaignRepository, LedgerStore, TrunkRepository},
    AppError, AppResult,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::{DISPATCH_BACKOFF_SECS, DRAIN_POLL_SECS};
use crate::notifier::Notifier;
use crate::origination::{OriginateRequest, OriginationGateway};

/// Simultaneous calls allowed for a campaign
pub fn concurrency_limit(campaign_max: i32, trunk_channels: i32, dialer_max: u32) -> usize {
    let dialer_max = i64::from(dialer_max);
    let limit = i64::from(campaign_max)
        .min(i64::from(trunk_channels))
        .min(dialer_max);
    limit.max(1) as usize
}

/// Gap between two originations at `cps`; falls back to `default_cps`
pub fn pacing_interval(cps: i32, default_cps: u32) -> Duration {
    let cps = if cps > 0 { cps as u64 } else { u64::from(default_cps.max(1)) };
    Duration::from_micros(1_000_000 / cps)
}

struct Worker {
    generation: u64,
    cancel: CancellationToken,
}

/// Calls this campaign has in flight, each holding one channel
type InFlight = HashMap<String, OwnedSemaphorePermit>;

enum Step {
    Continue,
    Backoff,
    Stop,
}

/// Campaign dispatcher
pub struct CampaignDispatcher<L: LedgerStore + 'static> {
    gateway: Arc<OriginationGateway<L>>,
    campaigns: Arc<dyn CampaignRepository>,
    calls: Arc<dyn CallRepository>,
    trunks: Arc<dyn TrunkRepository>,
    notifier: Notifier,
    config: DialerConfig,
    workers: Mutex<HashMap<i64, Worker>>,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl<L: LedgerStore + 'static> CampaignDispatcher<L> {
    pub fn new(
        gateway: Arc<OriginationGateway<L>>,
        campaigns: Arc<dyn CampaignRepository>,
        calls: Arc<dyn CallRepository>,
        trunks: Arc<dyn TrunkRepository>,
        notifier: Notifier,
        config: DialerConfig,
    ) -> Self {
        Self {
            gateway,
            campaigns,
            calls,
            trunks,
            notifier,
            config,
            workers: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Move a draft or paused campaign to running and start dialing
    ///
    /// The campaign needs a trunk and at least one open number.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>, campaign_id: i64) -> AppResult<Campaign> {
        let campaign = self
            .campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::CampaignNotFound(campaign_id.to_string()))?;

        if !campaign.status.can_start() {
            return Err(AppError::InvalidStateTransition(format!(
                "campaign {} is {}",
                campaign_id, campaign.status
            )));
        }

        if campaign.trunk_id.is_none() {
            return Err(AppError::Validation(
                "campaign has no trunk assigned".to_string(),
            ));
        }

        if self.campaigns.open_item_count(campaign_id).await? == 0 {
            return Err(AppError::Validation(
                "campaign has no numbers to dial".to_string(),
            ));
        }

        let campaign = self
            .campaigns
            .set_status(campaign_id, CampaignStatus::Running)
            .await?;
        info!("Campaign {} ({}) started", campaign.id, campaign.name);

        if self.config.enabled {
            self.spawn(campaign.clone());
        } else {
            warn!("Dialer disabled; campaign {} will not dial", campaign.id);
        }

        Ok(campaign)
    }

    /// Stop originating for a running campaign
    #[instrument(skip(self))]
    pub async fn pause(&self, campaign_id: i64) -> AppResult<Campaign> {
        let campaign = self
            .campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::CampaignNotFound(campaign_id.to_string()))?;

        if !campaign.status.can_pause() {
            return Err(AppError::InvalidStateTransition(format!(
                "campaign {} is {}",
                campaign_id, campaign.status
            )));
        }

        let campaign = self
            .campaigns
            .set_status(campaign_id, CampaignStatus::Paused)
            .await?;
        self.stop_worker(campaign_id);

        info!("Campaign {} paused", campaign_id);
        Ok(campaign)
    }

    /// Restart workers for campaigns left running by a previous process
    pub async fn resume_running(self: &Arc<Self>) -> AppResult<usize> {
        let running = self.campaigns.list_running().await?;
        let count = running.len();
        for campaign in running {
            self.spawn(campaign);
        }
        if count > 0 {
            info!("Resumed {} running campaigns", count);
        }
        Ok(count)
    }

    pub fn is_dispatching(&self, campaign_id: i64) -> bool {
        self.workers.lock().contains_key(&campaign_id)
    }

    /// Cancel every campaign worker
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.workers.lock().clear();
    }

    fn stop_worker(&self, campaign_id: i64) {
        if let Some(worker) = self.workers.lock().remove(&campaign_id) {
            worker.cancel.cancel();
        }
    }

    fn spawn(self: &Arc<Self>, campaign: Campaign) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        {
            let mut workers = self.workers.lock();
            if workers.contains_key(&campaign.id) {
                debug!("Campaign {} already dispatching", campaign.id);
                return;
            }
            workers.insert(
                campaign.id,
                Worker {
                    generation,
                    cancel: cancel.clone(),
                },
            );
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let campaign_id = campaign.id;
            if let Err(e) = this.run(&campaign, &cancel).await {
                error!("Dispatcher for campaign {} stopped: {}", campaign_id, e);
            }

            let mut workers = this.workers.lock();
            if workers
                .get(&campaign_id)
                .is_some_and(|w| w.generation == generation)
            {
                workers.remove(&campaign_id);
            }
        });
    }

    async fn run(&self, campaign: &Campaign, cancel: &CancellationToken) -> AppResult<()> {
        let trunk_id = campaign
            .trunk_id
            .ok_or_else(|| AppError::Validation("campaign has no trunk assigned".to_string()))?;
        let trunk = self
            .trunks
            .find_by_id(trunk_id)
            .await?
            .ok_or_else(|| AppError::TrunkNotFound(trunk_id.to_string()))?;

        let slots = concurrency_limit(
            campaign.max_concurrent,
            trunk.max_channels,
            self.config.max_concurrent_calls,
        );
        let channels = Arc::new(Semaphore::new(slots));
        let mut in_flight = InFlight::new();
        let mut events = self.notifier.subscribe();

        let mut pacer = interval(pacing_interval(campaign.cps, self.config.default_cps));
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Dispatching campaign {} with {} channels at {} cps",
            campaign.id, slots, campaign.cps
        );

        loop {
            self.drain_events(&mut events, &mut in_flight).await;

            let permit = match Arc::clone(&channels).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        received = events.recv() => {
                            self.on_event(received, &mut in_flight).await;
                        }
                    }
                    continue;
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = pacer.tick() => {}
            }

            let Some(item) = self.campaigns.claim_next_item(campaign.id).await? else {
                drop(permit);
                if self.finish_if_drained(campaign).await? {
                    return Ok(());
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    received = events.recv() => self.on_event(received, &mut in_flight).await,
                    _ = sleep(Duration::from_secs(DRAIN_POLL_SECS)) => {}
                }
                continue;
            };

            match self.dial(campaign, trunk_id, &item, permit, &mut in_flight).await? {
                Step::Continue => {}
                Step::Backoff => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = sleep(Duration::from_secs(DISPATCH_BACKOFF_SECS)) => {}
                    }
                }
                Step::Stop => return Ok(()),
            }
        }
    }

    async fn dial(
        &self,
        campaign: &Campaign,
        trunk_id: i64,
        item: &CampaignItem,
        permit: OwnedSemaphorePermit,
        in_flight: &mut InFlight,
    ) -> AppResult<Step> {
        let request = OriginateRequest {
            account_id: campaign.account_id,
            campaign_id: Some(campaign.id),
            campaign_item_id: Some(item.id),
            trunk_id,
            destination: item.phone_number.clone(),
            caller_id: campaign.caller_id.clone(),
            variables: BTreeMap::new(),
        };

        match self.gateway.originate(request).await {
            Ok(result) if result.accepted => {
                debug!("Item {} dialing as call {}", item.id, result.call_id);
                in_flight.insert(result.call_id, permit);
                Ok(Step::Continue)
            }
            Ok(result) => {
                debug!(
                    "Item {} failed at origination: {}",
                    item.id,
                    result.reason.unwrap_or_default()
                );
                Ok(Step::Continue)
            }
            Err(AppError::SwitchUnavailable(reason)) => {
                warn!(
                    "Switch unavailable for campaign {}: {}; retrying in {}s",
                    campaign.id, reason, DISPATCH_BACKOFF_SECS
                );
                drop(permit);
                self.campaigns.release_item(item.id).await?;
                Ok(Step::Backoff)
            }
            Err(AppError::InsufficientBalance {
                required,
                available,
            }) => {
                warn!(
                    "Campaign {} paused: balance {} below {}",
                    campaign.id, available, required
                );
                self.campaigns.release_item(item.id).await?;
                self.campaigns
                    .set_status(campaign.id, CampaignStatus::Paused)
                    .await?;
                Ok(Step::Stop)
            }
            Err(e) => {
                self.campaigns.release_item(item.id).await?;
                Err(e)
            }
        }
    }

    /// Complete the campaign once no item is open; true if it is finished
    async fn finish_if_drained(&self, campaign: &Campaign) -> AppResult<bool> {
        if self.campaigns.open_item_count(campaign.id).await? > 0 {
            return Ok(false);
        }

        if self.campaigns.complete_if_drained(campaign.id).await? {
            info!("Campaign {} completed", campaign.id);
            self.notifier.publish(LedgerEvent::CampaignCompleted {
                campaign_id: campaign.id,
                account_id: campaign.account_id,
            });
        }
        Ok(true)
    }

    async fn drain_events(
        &self,
        events: &mut broadcast::Receiver<LedgerEvent>,
        in_flight: &mut InFlight,
    ) {
        loop {
            match events.try_recv() {
                Ok(event) => release_settled(&event, in_flight),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return,
                Err(TryRecvError::Lagged(missed)) => {
                    self.resync(missed, in_flight).await;
                }
            }
        }
    }

    async fn on_event(
        &self,
        received: Result<LedgerEvent, RecvError>,
        in_flight: &mut InFlight,
    ) {
        match received {
            Ok(event) => release_settled(&event, in_flight),
            Err(RecvError::Lagged(missed)) => self.resync(missed, in_flight).await,
            Err(RecvError::Closed) => sleep(Duration::from_secs(DRAIN_POLL_SECS)).await,
        }
    }

    /// Settlement notifications were lost; release channels by reading call state
    async fn resync(&self, missed: u64, in_flight: &mut InFlight) {
        warn!("Dispatcher missed {} ledger events, resyncing", missed);

        let call_ids: Vec<String> = in_flight.keys().cloned().collect();
        for call_id in call_ids {
            match self.calls.find_by_call_id(&call_id).await {
                Ok(Some(call)) if !call.is_settled() => {}
                Ok(_) => {
                    in_flight.remove(&call_id);
                }
                Err(e) => warn!("Could not check call {}: {}", call_id, e),
            }
        }
    }
}

fn release_settled(event: &LedgerEvent, in_flight: &mut InFlight) {
    if let LedgerEvent::CallSettled { call_id, .. } = event {
        if in_flight.remove(call_id).is_some() {
            debug!("Call {} settled, channel released", call_id);
        }
    }
}
