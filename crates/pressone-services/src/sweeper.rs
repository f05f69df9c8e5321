//! Stale call sweeper
//!
//! Calls stuck in QUEUED or ORIGINATING are settled FAILED at zero cost,
//! but only once they are older than the ring timeout plus the absolute
//! call limit the switch enforces. By then no channel can still be up, so a
//! silent call is one whose origination never happened or whose hangup
//! report was lost.

use pressone_core::{
    config::DialerConfig,
    models::ReconcileOutcome,
    traits::{CallRepository, LedgerStore},
    AppResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::constants::{CAUSE_ORIGINATE_TIMEOUT, SWEEP_BATCH};
use crate::reconciler::Reconciler;

pub struct StaleCallSweeper<L: LedgerStore> {
    calls: Arc<dyn CallRepository>,
    reconciler: Arc<Reconciler<L>>,
    stale_after_secs: i64,
    every: Duration,
}

impl<L: LedgerStore + 'static> StaleCallSweeper<L> {
    pub fn new(
        calls: Arc<dyn CallRepository>,
        reconciler: Arc<Reconciler<L>>,
        config: &DialerConfig,
    ) -> Self {
        Self {
            calls,
            reconciler,
            stale_after_secs: config.stale_after_secs(),
            every: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    /// Fail every stale call found in one pass; returns how many were settled
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> AppResult<usize> {
        let stale = self
            .calls
            .find_stale(self.stale_after_secs, SWEEP_BATCH)
            .await?;

        let mut settled = 0;
        for call in stale {
            match self
                .reconciler
                .fail_call(&call.call_id, CAUSE_ORIGINATE_TIMEOUT)
                .await
            {
                Ok(ReconcileOutcome::Applied) => settled += 1,
                Ok(outcome) => debug!("Stale call {}: {:?}", call.call_id, outcome),
                Err(e) => error!("Failed to expire call {}: {}", call.call_id, e),
            }
        }

        if settled > 0 {
            info!("Expired {} stale calls", settled);
        }
        Ok(settled)
    }

    /// Sweep on an interval until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Stale call sweeper running every {:?} (threshold {}s)",
            self.every, self.stale_after_secs
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stale call sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Stale call sweep failed: {}", e);
                    }
                }
            }
        }
    }
}
