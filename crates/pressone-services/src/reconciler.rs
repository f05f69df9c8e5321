//! Campaign/ledger reconciler
//!
//! Applies terminal call events and payment confirmations to the ledger:
//! - Settle a call exactly once (state, cost, campaign aggregate, balance)
//! - Annotate DTMF results on unsettled calls
//! - Fail calls the switch refused or never reported on
//! - Credit completed payments exactly once
//!
//! Each event runs under a per-key in-process lock and inside one ledger
//! transaction that locks the call (or payment) row first. Notifications go
//! out only after the transaction commits.

use chrono::Utc;
use pressone_core::{
    models::{
        Call, CampaignDelta, DtmfEvent, HangupEvent, HangupOutcome, LedgerEvent, PaymentEvent,
        PaymentSignal, PaymentStatus, ReconcileOutcome,
    },
    traits::{LedgerStore, LedgerTx},
    AppResult, BillingCalculator,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::keyed_lock::KeyedLocks;
use crate::notifier::Notifier;

fn call_key(call_id: &str) -> String {
    format!("call:{}", call_id)
}

fn payment_key(track_id: &str) -> String {
    format!("payment:{}", track_id)
}

/// Reason the event's campaign references contradict the stored call, if any
fn contradiction(call: &Call, campaign_id: Option<i64>, item_id: Option<i64>) -> Option<String> {
    if let Some(id) = campaign_id {
        if call.campaign_id != Some(id) {
            return Some(format!("campaign {} does not match call {}", id, call.call_id));
        }
    }
    if let Some(id) = item_id {
        if call.campaign_item_id != Some(id) {
            return Some(format!("campaign item {} does not match call {}", id, call.call_id));
        }
    }
    None
}

/// Ledger reconciler
pub struct Reconciler<L: LedgerStore> {
    store: Arc<L>,
    calculator: BillingCalculator,
    locks: KeyedLocks,
    notifier: Notifier,
}

impl<L: LedgerStore> Reconciler<L> {
    pub fn new(
        store: Arc<L>,
        calculator: BillingCalculator,
        locks: KeyedLocks,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            calculator,
            locks,
            notifier,
        }
    }

    pub fn calculator(&self) -> &BillingCalculator {
        &self.calculator
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Record a DTMF result
    ///
    /// A payload that also carries a hangup cause settles the call in the
    /// same transaction.
    #[instrument(skip(self, event), fields(call_id = %event.call_id, digit = %event.digit))]
    pub async fn record_dtmf(&self, event: &DtmfEvent) -> AppResult<ReconcileOutcome> {
        let _guard = self.locks.lock(&call_key(&event.call_id)).await;
        let mut tx = self.store.begin().await?;

        let Some(mut call) = tx.lock_call(&event.call_id).await? else {
            warn!("DTMF for unknown call {}", event.call_id);
            return Ok(ReconcileOutcome::UnknownKey);
        };

        if let Some(reason) = contradiction(&call, event.campaign_id, event.campaign_item_id) {
            warn!("Rejecting DTMF: {}", reason);
            return Ok(ReconcileOutcome::Rejected(reason));
        }

        if call.is_settled() {
            warn!(
                "Late DTMF for settled call {} ({}), ignoring",
                call.call_id, call.state
            );
            return Ok(ReconcileOutcome::Duplicate);
        }

        let annotated = match call.state.annotate_dtmf(event.pressed_one()) {
            Some(next) => {
                debug!("Call {}: {} -> {}", call.call_id, call.state, next);
                call.state = next;
                true
            }
            None => false,
        };

        if let Some(hangup) = event.as_hangup() {
            let outcome = HangupOutcome::from_hangup_cause(&hangup.hangup_cause);
            let events = self
                .settle_locked(
                    &mut tx,
                    &mut call,
                    hangup.duration_seconds,
                    &hangup.hangup_cause,
                    outcome,
                )
                .await?;
            tx.commit().await?;
            self.publish(events);
            return Ok(ReconcileOutcome::Applied);
        }

        if !annotated {
            debug!("DTMF for call {} changes nothing", call.call_id);
            return Ok(ReconcileOutcome::Duplicate);
        }

        tx.update_call(&call).await?;
        tx.commit().await?;

        info!("Call {} annotated {}", call.call_id, call.state);
        Ok(ReconcileOutcome::Applied)
    }

    /// Settle a call from its hangup event
    #[instrument(skip(self, event), fields(call_id = %event.call_id))]
    pub async fn settle_call(&self, event: &HangupEvent) -> AppResult<ReconcileOutcome> {
        let _guard = self.locks.lock(&call_key(&event.call_id)).await;
        let mut tx = self.store.begin().await?;

        let Some(mut call) = tx.lock_call(&event.call_id).await? else {
            warn!("Hangup for unknown call {}", event.call_id);
            return Ok(ReconcileOutcome::UnknownKey);
        };

        if let Some(reason) = contradiction(&call, event.campaign_id, event.campaign_item_id) {
            warn!("Rejecting hangup: {}", reason);
            return Ok(ReconcileOutcome::Rejected(reason));
        }

        if call.is_settled() {
            warn!("Duplicate hangup for call {}", call.call_id);
            return Ok(ReconcileOutcome::Duplicate);
        }

        let outcome = HangupOutcome::from_hangup_cause(&event.hangup_cause);
        let events = self
            .settle_locked(
                &mut tx,
                &mut call,
                event.duration_seconds,
                &event.hangup_cause,
                outcome,
            )
            .await?;
        tx.commit().await?;
        self.publish(events);

        Ok(ReconcileOutcome::Applied)
    }

    /// Settle a call that never reached the callee as FAILED with zero duration
    ///
    /// Only QUEUED or ORIGINATING calls are failed; a call the IVR already
    /// reported on is left for its hangup (`Ignored`).
    #[instrument(skip(self))]
    pub async fn fail_call(&self, call_id: &str, reason: &str) -> AppResult<ReconcileOutcome> {
        let _guard = self.locks.lock(&call_key(call_id)).await;
        let mut tx = self.store.begin().await?;

        let Some(mut call) = tx.lock_call(call_id).await? else {
            warn!("Cannot fail unknown call {}", call_id);
            return Ok(ReconcileOutcome::UnknownKey);
        };

        if call.is_settled() {
            debug!("Call {} already settled as {}", call_id, call.state);
            return Ok(ReconcileOutcome::Duplicate);
        }

        if !call.state.is_pending() {
            debug!("Call {} is live ({}), not failing it", call_id, call.state);
            return Ok(ReconcileOutcome::Ignored);
        }

        let events = self
            .settle_locked(&mut tx, &mut call, 0, reason, HangupOutcome::Failed)
            .await?;
        tx.commit().await?;
        self.publish(events);

        Ok(ReconcileOutcome::Applied)
    }

    /// Credit a completed payment exactly once
    #[instrument(skip(self, event), fields(track_id = %event.track_id, status = %event.status))]
    pub async fn confirm_payment(&self, event: &PaymentEvent) -> AppResult<ReconcileOutcome> {
        match PaymentSignal::from_status(&event.status) {
            PaymentSignal::Credit => {}
            PaymentSignal::Failed => {
                info!(
                    "Payment {} reported {}, nothing to credit",
                    event.track_id, event.status
                );
                return Ok(ReconcileOutcome::Ignored);
            }
            PaymentSignal::Other => {
                debug!("Payment {} status {} ignored", event.track_id, event.status);
                return Ok(ReconcileOutcome::Ignored);
            }
        }

        let _guard = self.locks.lock(&payment_key(&event.track_id)).await;
        let mut tx = self.store.begin().await?;

        let Some(payment) = tx.lock_payment(&event.track_id).await? else {
            warn!("Payment callback for unknown track id {}", event.track_id);
            return Ok(ReconcileOutcome::UnknownKey);
        };

        match payment.status {
            PaymentStatus::Completed => {
                warn!("Duplicate payment confirmation for {}", payment.track_id);
                return Ok(ReconcileOutcome::Duplicate);
            }
            PaymentStatus::Failed => {
                warn!("Confirmation for failed payment {} ignored", payment.track_id);
                return Ok(ReconcileOutcome::Ignored);
            }
            PaymentStatus::Pending => {}
        }

        if let Some(amount) = event.amount {
            if amount != payment.amount {
                warn!(
                    "Payment {} confirmed for {} but registered for {}",
                    payment.track_id, amount, payment.amount
                );
            }
        }

        tx.mark_payment_completed(payment.id, event.tx_hash.as_deref())
            .await?;
        let balance = tx
            .credit_for_payment(
                payment.account_id,
                &payment.track_id,
                payment.credits_requested,
            )
            .await?;
        tx.commit().await?;

        info!(
            "Payment {} credited {} to account {}, balance {}",
            payment.track_id, payment.credits_requested, payment.account_id, balance
        );

        self.notifier.publish(LedgerEvent::BalanceChanged {
            account_id: payment.account_id,
            credit_balance: balance,
            reference: payment.track_id,
        });

        Ok(ReconcileOutcome::Applied)
    }

    /// Write the final state of a locked, unsettled call and its side effects
    async fn settle_locked(
        &self,
        tx: &mut L::Tx,
        call: &mut Call,
        duration_seconds: i32,
        cause: &str,
        outcome: HangupOutcome,
    ) -> AppResult<Vec<LedgerEvent>> {
        let duration = duration_seconds.max(0);
        let final_state = call.state.settle_with(outcome);
        let cost = self.calculator.cost(duration);

        call.state = final_state;
        call.duration_seconds = duration;
        call.hangup_cause = Some(cause.to_string());
        call.billed_cost = Some(cost);
        call.ended_at = Some(Utc::now());
        tx.update_call(call).await?;

        let mut drained = None;
        if let Some(campaign_id) = call.campaign_id {
            let owns_item = match call.campaign_item_id {
                Some(item_id) => tx.complete_campaign_item(item_id, &call.call_id).await?,
                None => false,
            };

            if owns_item {
                let delta = CampaignDelta::for_settlement(final_state, cost);
                let stats = tx.apply_campaign_delta(campaign_id, &delta).await?;
                debug!(
                    "Campaign {}: {}/{} completed, {} pressed one",
                    campaign_id, stats.completed, stats.total_numbers, stats.pressed_one
                );
                if tx.complete_campaign_if_drained(campaign_id).await? {
                    info!("Campaign {} drained by call {}", campaign_id, call.call_id);
                    drained = Some(campaign_id);
                }
            } else {
                // Counters belong to the call that now owns the item; spend is still ours.
                warn!(
                    "Call {} no longer owns its campaign item, adding only its cost to campaign {}",
                    call.call_id, campaign_id
                );
                tx.apply_campaign_delta(campaign_id, &CampaignDelta::cost_only(cost))
                    .await?;
            }
        }

        let balance = tx
            .debit_for_call(call.account_id, &call.call_id, cost)
            .await?;

        info!(
            "Call {} settled {} ({}s, cause {}) cost {}",
            call.call_id, final_state, duration, cause, cost
        );

        let mut events = vec![
            LedgerEvent::CallSettled {
                call_id: call.call_id.clone(),
                account_id: call.account_id,
                campaign_id: call.campaign_id,
                state: final_state.to_string(),
                billed_cost: cost,
            },
            LedgerEvent::BalanceChanged {
                account_id: call.account_id,
                credit_balance: balance,
                reference: call.call_id.clone(),
            },
        ];
        if let Some(campaign_id) = drained {
            events.push(LedgerEvent::CampaignCompleted {
                campaign_id,
                account_id: call.account_id,
            });
        }

        Ok(events)
    }

    fn publish(&self, events: Vec<LedgerEvent>) {
        for event in events {
            self.notifier.publish(event);
        }
    }
}
