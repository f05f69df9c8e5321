//! Ledger change notifications
//!
//! Published only after a reconciliation commits. Slow subscribers lose the
//! oldest events (`RecvError::Lagged`); the database stays authoritative.

use pressone_core::models::LedgerEvent;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<LedgerEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine
        if let Ok(receivers) = self.tx.send(event) {
            debug!("Ledger event delivered to {} subscribers", receivers);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(crate::constants::NOTIFY_CAPACITY)
    }
}
