use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::warn;

use blobcask_hash::{ContentHash, Fingerprint};

use crate::errors::StoreFault;

/// Shared result of a store exchange.
pub type StoreOutcome = std::result::Result<ContentHash, StoreFault>;

type Slot = watch::Receiver<Option<StoreOutcome>>;
type SlotMap = Arc<Mutex<HashMap<Fingerprint, Slot>>>;

/// Deduplicates concurrent store operations for the same fingerprint
/// within one process.
///
/// The first caller to register becomes the leader and must drive the
/// remote exchange to completion; everyone else becomes a follower and
/// awaits the leader's outcome. Entries are removed when the leader
/// settles, so a later store of the same payload registers fresh.
#[derive(Clone, Default)]
pub struct PendingStores {
    slots: SlotMap,
}

/// Result of registering interest in a fingerprint.
pub enum Registration {
    /// No operation was outstanding; the caller owns the exchange.
    Leader(StoreGuard),
    /// An operation is in flight; await its shared outcome.
    Follower(StoreHandle),
}

/// Leader-side handle. Settling it wakes every follower with the same
/// outcome and clears the registry entry. Dropping it unsettled counts
/// as abandonment so followers never hang.
pub struct StoreGuard {
    fingerprint: Fingerprint,
    tx: watch::Sender<Option<StoreOutcome>>,
    slots: SlotMap,
    settled: bool,
}

/// Follower-side handle on an in-flight store.
pub struct StoreHandle {
    rx: Slot,
}

impl PendingStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `fingerprint`, becoming leader if no
    /// operation for it is outstanding.
    pub fn register(&self, fingerprint: Fingerprint) -> Registration {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get(&fingerprint) {
            return Registration::Follower(StoreHandle { rx: slot.clone() });
        }
        let (tx, rx) = watch::channel(None);
        slots.insert(fingerprint.clone(), rx);
        Registration::Leader(StoreGuard {
            fingerprint,
            tx,
            slots: Arc::clone(&self.slots),
            settled: false,
        })
    }

    /// Number of outstanding store operations
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }
}

impl StoreGuard {
    /// Settle the operation, delivering `outcome` to all followers and
    /// removing the registry entry.
    pub fn complete(mut self, outcome: StoreOutcome) {
        self.settle(outcome);
    }

    fn settle(&mut self, outcome: StoreOutcome) {
        if self.settled {
            return;
        }
        self.settled = true;
        let _ = self.tx.send(Some(outcome));
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&self.fingerprint);
        }
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!(fingerprint = %self.fingerprint, "store leader dropped without settling");
            self.settle(Err(StoreFault::Abandoned));
        }
    }
}

impl StoreHandle {
    /// Wait for the leader's outcome.
    pub async fn outcome(mut self) -> StoreOutcome {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Err(StoreFault::Abandoned)),
            Err(_) => Err(StoreFault::Abandoned),
        }
    }
}
