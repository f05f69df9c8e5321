//! Event ingestion
//!
//! Normalizes switch and payment-processor callbacks and hands them to the
//! reconciler. The HTTP layer depends only on the `EventIngestion` trait.

use async_trait::async_trait;
use pressone_core::{
    models::{DtmfEvent, HangupEvent, PaymentEvent, ReconcileOutcome},
    traits::LedgerStore,
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::reconciler::Reconciler;

/// Entry point for lifecycle and payment events
#[async_trait]
pub trait EventIngestion: Send + Sync {
    async fn ingest_dtmf(&self, event: DtmfEvent) -> AppResult<ReconcileOutcome>;

    async fn ingest_hangup(&self, event: HangupEvent) -> AppResult<ReconcileOutcome>;

    async fn ingest_payment(&self, event: PaymentEvent) -> AppResult<ReconcileOutcome>;
}

fn require_key(name: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", name)));
    }
    Ok(trimmed.to_string())
}

fn log_outcome(kind: &str, key: &str, outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Applied => info!("{} event for {} applied", kind, key),
        ReconcileOutcome::Ignored => info!("{} event for {} ignored", kind, key),
        ReconcileOutcome::Duplicate => warn!("{} event for {} was a duplicate", kind, key),
        ReconcileOutcome::UnknownKey => warn!("{} event for unknown key {}", kind, key),
        ReconcileOutcome::Rejected(reason) => {
            warn!("{} event for {} rejected: {}", kind, key, reason)
        }
    }
}

/// Ingestion backed by the ledger reconciler
pub struct EventIngestor<L: LedgerStore> {
    reconciler: Arc<Reconciler<L>>,
}

impl<L: LedgerStore> EventIngestor<L> {
    pub fn new(reconciler: Arc<Reconciler<L>>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<L: LedgerStore> EventIngestion for EventIngestor<L> {
    #[instrument(skip(self, event), fields(call_id = %event.call_id))]
    async fn ingest_dtmf(&self, mut event: DtmfEvent) -> AppResult<ReconcileOutcome> {
        event.call_id = require_key("call_id", &event.call_id)?;
        event.digit = event.digit.trim().to_string();

        let outcome = self.reconciler.record_dtmf(&event).await?;
        log_outcome("DTMF", &event.call_id, &outcome);
        Ok(outcome)
    }

    #[instrument(skip(self, event), fields(call_id = %event.call_id))]
    async fn ingest_hangup(&self, mut event: HangupEvent) -> AppResult<ReconcileOutcome> {
        event.call_id = require_key("call_id", &event.call_id)?;
        if event.duration_seconds < 0 {
            return Err(AppError::InvalidInput(
                "duration must not be negative".to_string(),
            ));
        }

        let outcome = self.reconciler.settle_call(&event).await?;
        log_outcome("Hangup", &event.call_id, &outcome);
        Ok(outcome)
    }

    #[instrument(skip(self, event), fields(track_id = %event.track_id))]
    async fn ingest_payment(&self, mut event: PaymentEvent) -> AppResult<ReconcileOutcome> {
        event.track_id = require_key("track_id", &event.track_id)?;

        let outcome = self.reconciler.confirm_payment(&event).await?;
        log_outcome("Payment", &event.track_id, &outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_key() {
        assert_eq!(require_key("call_id", "  c-1 ").unwrap(), "c-1");
        assert!(matches!(
            require_key("call_id", "   "),
            Err(AppError::InvalidInput(_))
        ));
    }
}
