//! Dedup registry: collapses identical in-flight proposals into one.
//!
//! When the user interrupts the agent, the model often re-issues the exact
//! tool call it just made. Both calls share a fingerprint; only the first
//! starts an approval exchange, the second joins its outcome.

use crate::approval::types::{Fingerprint, ResolvedOutcome};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Outcome future that any number of joiners can await.
pub type SharedOutcome = Shared<BoxFuture<'static, ResolvedOutcome>>;

const REASON_ABANDONED: &str = "Approval request was abandoned before it resolved";

/// Result of `DedupRegistry::register_or_join`.
pub enum Registration {
    /// First request for this fingerprint. The holder runs the exchange and
    /// must settle the entry.
    New(PendingOutcome),
    /// Identical request already in flight. Do not start another exchange.
    Joined(SharedOutcome),
}

/// Fingerprint → in-flight outcome. At most one entry per fingerprint.
#[derive(Default)]
pub struct DedupRegistry {
    entries: Mutex<HashMap<Fingerprint, SharedOutcome>>,
}

impl DedupRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically create an entry for `fingerprint` or join the existing one.
    pub fn register_or_join(self: &Arc<Self>, fingerprint: &Fingerprint) -> Registration {
        let mut entries = self.lock();

        if let Some(existing) = entries.get(fingerprint) {
            return Registration::Joined(existing.clone());
        }

        let (tx, rx) = oneshot::channel();
        let outcome: SharedOutcome = rx
            .map(|res| res.unwrap_or_else(|_| ResolvedOutcome::failed(REASON_ABANDONED)))
            .boxed()
            .shared();
        entries.insert(fingerprint.clone(), outcome);

        Registration::New(PendingOutcome {
            fingerprint: fingerprint.clone(),
            registry: Arc::clone(self),
            tx: Some(tx),
        })
    }

    /// Number of fingerprints currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().contains_key(fingerprint)
    }

    fn remove(&self, fingerprint: &Fingerprint) {
        self.lock().remove(fingerprint);
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, SharedOutcome>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settle handle for a newly registered fingerprint.
///
/// `settle` consumes the handle, so an entry resolves at most once. Dropping
/// an unsettled handle resolves joiners with a failure and still removes the
/// entry.
pub struct PendingOutcome {
    fingerprint: Fingerprint,
    registry: Arc<DedupRegistry>,
    tx: Option<oneshot::Sender<ResolvedOutcome>>,
}

impl PendingOutcome {
    pub fn settle(mut self, outcome: ResolvedOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: ResolvedOutcome) {
        if let Some(tx) = self.tx.take() {
            // Remove first: anyone arriving after this starts a fresh cycle.
            self.registry.remove(&self.fingerprint);
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for PendingOutcome {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(fingerprint = %self.fingerprint, "Pending outcome dropped without settling");
            self.finish(ResolvedOutcome::failed(REASON_ABANDONED));
        }
    }
}
