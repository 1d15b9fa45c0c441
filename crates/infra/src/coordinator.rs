//! Retry coordination for conditional writes.
//!
//! Every mutation goes through the same cycle: read the current record, apply
//! the transition in memory, then commit with a conditional write guarded by
//! the revision that was read. A lost race shows up as a concurrency error
//! from the store; the coordinator re-reads and re-applies, up to
//! [`MAX_ATTEMPTS`] times, then surfaces
//! [`LedgerError::ConcurrencyExhausted`].
//!
//! Business rejections (insufficient stock, over-release, negative totals)
//! are deterministic against the freshly read state and are never retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use stockledger_core::{ActorId, ExpectedRevision, ProductId, RecordId, StockError};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{ChangeEvent, ChangeKind, InventoryRecord, NaturalKey, StockTransition};

use crate::record_store::{RecordStore, RecordStoreError};

/// Upper bound on commit attempts per mutation. No backoff between attempts;
/// each retry re-reads fresh state, so an immediate retry is already working
/// against a different revision.
pub const MAX_ATTEMPTS: u32 = 4;

/// Stream name used for all inventory change envelopes.
pub const STREAM_NAME: &str = "inventory.record";

/// Ledger operation error, the service-level taxonomy callers match on.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Deterministic business rejection from a transition.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// No record tracks the requested id or natural key.
    #[error("inventory record not found")]
    NotFound,

    /// Creation refused: the natural key is already tracked.
    #[error("a record already tracks {0}")]
    DuplicateRecord(NaturalKey),

    /// Deletion refused while stock is held against pending orders.
    #[error("record still holds {reserved} reserved unit(s)")]
    ReservedStock { reserved: i64 },

    /// Creation refused: the catalog does not know this product.
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    /// The conditional write lost every race in its retry budget.
    #[error("concurrent updates exhausted {attempts} attempt(s)")]
    ConcurrencyExhausted { attempts: u32 },

    /// Backend fault.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<RecordStoreError> for LedgerError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::DuplicateRecord(key) => LedgerError::DuplicateRecord(key),
            RecordStoreError::NotFound => LedgerError::NotFound,
            // A conflict that escapes the retry loop counts as one exhausted
            // attempt; the loop itself intercepts conflicts before this
            // conversion runs.
            RecordStoreError::Concurrency(_) => LedgerError::ConcurrencyExhausted { attempts: 1 },
            RecordStoreError::ReservedStock { reserved } => LedgerError::ReservedStock { reserved },
            RecordStoreError::Storage(msg) => LedgerError::Storage(msg),
        }
    }
}

/// Read-apply-commit coordinator over a [`RecordStore`] and an event bus.
#[derive(Debug)]
pub struct Coordinator<S, B> {
    store: S,
    bus: B,

    /// Per-key guard held across commit and publish. Envelopes for one
    /// record must reach the bus in non-decreasing revision order, and the
    /// store's conditional write alone cannot guarantee that: a committer
    /// can be descheduled between its commit and its publish while a later
    /// revision publishes first. Different keys never contend on this map.
    publish_locks: Mutex<HashMap<NaturalKey, Arc<Mutex<()>>>>,
}

impl<S, B> Coordinator<S, B>
where
    S: RecordStore,
    B: EventBus<EventEnvelope<ChangeEvent>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            publish_locks: Mutex::new(HashMap::new()),
        }
    }

    fn publish_lock(&self, key: &NaturalKey) -> Arc<Mutex<()>> {
        let mut locks = self
            .publish_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(*key).or_default().clone()
    }

    /// Apply `transition` to the record at `key`, retrying lost races.
    ///
    /// On success the committed record is returned and the resulting change
    /// events (including any threshold alert) are published. Publication is
    /// best-effort: a bus failure is logged and never fails the mutation,
    /// which has already committed.
    #[instrument(skip(self), fields(key = %key, attempts = tracing::field::Empty), err)]
    pub fn execute(
        &self,
        key: &NaturalKey,
        transition: StockTransition,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.store.get_by_key(key)?;
            let next = transition.apply(&current, actor, Utc::now())?;

            let lock = self.publish_lock(key);
            let _commit_guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            match self
                .store
                .save(next, ExpectedRevision::Exact(current.revision))
            {
                Ok(committed) => {
                    tracing::Span::current().record("attempts", attempt);
                    self.publish_changes(transition.kind(), &current, &committed);
                    return Ok(committed);
                }
                Err(RecordStoreError::Concurrency(_)) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(LedgerError::ConcurrencyExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Publish the change events for a committed transition.
    fn publish_changes(
        &self,
        kind: ChangeKind,
        previous: &InventoryRecord,
        committed: &InventoryRecord,
    ) {
        for event in ChangeEvent::for_transition(kind, previous, committed) {
            self.publish(committed, event);
        }
    }

    /// Insert a fresh record and announce it, under the per-key guard.
    pub(crate) fn create(
        &self,
        record: InventoryRecord,
    ) -> Result<InventoryRecord, RecordStoreError> {
        let lock = self.publish_lock(&record.key);
        let _commit_guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let committed = self.store.insert(record)?;
        for event in ChangeEvent::for_created(&committed) {
            self.publish(&committed, event);
        }
        Ok(committed)
    }

    /// Remove a record and announce the removal, under the per-key guard.
    pub(crate) fn remove(
        &self,
        id: RecordId,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, RecordStoreError> {
        let current = self.store.get(id)?;
        let lock = self.publish_lock(&current.key);
        let _commit_guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.store.remove(id)?;
        self.publish(&removed, ChangeEvent::for_deleted(&removed, actor, Utc::now()));
        Ok(removed)
    }

    /// Best-effort publish of a single change event.
    fn publish(&self, committed: &InventoryRecord, event: ChangeEvent) {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            committed.id,
            STREAM_NAME.to_string(),
            committed.revision,
            event,
        );
        if let Err(e) = self.bus.publish(envelope) {
            warn!(record_id = %committed.id, error = ?e, "failed to publish change event");
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}
