//! The inventory ledger: the service surface callers talk to.
//!
//! Wraps a [`RecordStore`], the retry [`Coordinator`], and a
//! [`ProductCatalog`] behind operation methods (create, reserve, release,
//! fulfill, restock, queries, delete). All mutations funnel through the
//! coordinator so every write carries the revision guard.

use chrono::Utc;
use tracing::instrument;

use stockledger_core::{ActorId, LocationId, ProductId, RecordId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    ChangeEvent, InventoryRecord, NaturalKey, ProductCatalog, StockStatus, StockTransition,
};

use crate::coordinator::{Coordinator, LedgerError};
use crate::record_store::RecordStore;

/// Result of a batch restock: per-key outcomes, never all-or-nothing.
#[derive(Debug)]
pub struct BatchOutcome {
    pub succeeded: Vec<InventoryRecord>,
    pub failed: Vec<(NaturalKey, LedgerError)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Inventory ledger service.
pub struct InventoryLedger<S, B, C> {
    coordinator: Coordinator<S, B>,
    catalog: C,
}

impl<S, B, C> InventoryLedger<S, B, C>
where
    S: RecordStore,
    B: EventBus<EventEnvelope<ChangeEvent>>,
    C: ProductCatalog,
{
    pub fn new(store: S, bus: B, catalog: C) -> Self {
        Self {
            coordinator: Coordinator::new(store, bus),
            catalog,
        }
    }

    fn store(&self) -> &S {
        self.coordinator.store()
    }

    // Lifecycle

    /// Start tracking stock for a natural key.
    ///
    /// The product must exist in the catalog; the key must not already be
    /// tracked. Publishes a created event (plus a threshold alert when the
    /// initial quantity already sits at or below the reorder level).
    #[instrument(skip(self), fields(key = %key), err)]
    pub fn create_inventory(
        &self,
        key: NaturalKey,
        initial_quantity: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        if !self.catalog.product_exists(key.product_id) {
            return Err(LedgerError::UnknownProduct(key.product_id));
        }

        let record = InventoryRecord::new(RecordId::new(), key, initial_quantity, actor, Utc::now())?;
        Ok(self.coordinator.create(record)?)
    }

    /// Stop tracking a record. Refused while units are reserved.
    #[instrument(skip(self), fields(record_id = %id), err)]
    pub fn delete_inventory(
        &self,
        id: RecordId,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        Ok(self.coordinator.remove(id, actor)?)
    }

    // Mutations

    /// Set total stock by a signed delta (cycle counts, damage write-offs).
    pub fn adjust_stock(
        &self,
        key: &NaturalKey,
        delta: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::Adjust { delta }, actor)
    }

    /// Hold units against an order without removing them from stock.
    pub fn reserve(
        &self,
        key: &NaturalKey,
        qty: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::Reserve { qty }, actor)
    }

    /// Return held units to availability (order cancelled or expired).
    pub fn release(
        &self,
        key: &NaturalKey,
        qty: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::Release { qty }, actor)
    }

    /// Ship held units: consumes the reservation and the stock together.
    pub fn fulfill(
        &self,
        key: &NaturalKey,
        qty: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::Fulfill { qty }, actor)
    }

    /// Receive stock from a supplier.
    pub fn restock(
        &self,
        key: &NaturalKey,
        qty: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::Restock { qty }, actor)
    }

    /// Change the low-stock threshold for a record.
    pub fn set_reorder_level(
        &self,
        key: &NaturalKey,
        level: i64,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::SetReorderLevel { level }, actor)
    }

    /// Change (or clear) the capacity hint for a record.
    pub fn set_max_level(
        &self,
        key: &NaturalKey,
        level: Option<i64>,
        actor: Option<ActorId>,
    ) -> Result<InventoryRecord, LedgerError> {
        self.coordinator
            .execute(key, StockTransition::SetMaxLevel { level }, actor)
    }

    /// Restock several keys in one call. Each key commits (and retries)
    /// independently; one failure never rolls back the others.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub fn restock_many(
        &self,
        items: Vec<(NaturalKey, i64)>,
        actor: Option<ActorId>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            succeeded: Vec::with_capacity(items.len()),
            failed: Vec::new(),
        };
        for (key, qty) in items {
            match self.restock(&key, qty, actor) {
                Ok(record) => outcome.succeeded.push(record),
                Err(e) => outcome.failed.push((key, e)),
            }
        }
        outcome
    }

    // Queries

    pub fn get_record(&self, id: RecordId) -> Result<InventoryRecord, LedgerError> {
        Ok(self.store().get(id)?)
    }

    pub fn get_record_by_key(&self, key: &NaturalKey) -> Result<InventoryRecord, LedgerError> {
        Ok(self.store().get_by_key(key)?)
    }

    pub fn list_records(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        Ok(self.store().list_all()?)
    }

    /// Sum of available units for a product, optionally narrowed to one
    /// location. Spans every variant of the product.
    pub fn get_available(
        &self,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> Result<i64, LedgerError> {
        let records = self.store().list_by_product(product_id)?;
        Ok(records
            .iter()
            .filter(|r| location_id.is_none() || r.key.location_id == location_id)
            .map(InventoryRecord::available_quantity)
            .sum())
    }

    /// Sum of total units for a product across all records.
    pub fn total_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        let records = self.store().list_by_product(product_id)?;
        Ok(records.iter().map(|r| r.total_quantity).sum())
    }

    /// Sum of reserved units for a product across all records.
    pub fn total_reserved(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        let records = self.store().list_by_product(product_id)?;
        Ok(records.iter().map(|r| r.reserved_quantity).sum())
    }

    /// Records at or below a threshold. With `Some(t)` the same cutoff
    /// applies to every record; with `None` each record is judged against
    /// its own reorder level.
    pub fn list_low_stock(
        &self,
        threshold: Option<i64>,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let records = self.store().list_all()?;
        Ok(records
            .into_iter()
            .filter(|r| match threshold {
                Some(t) => r.available_quantity() <= t,
                None => StockStatus::classify(r) != StockStatus::Ok,
            })
            .collect())
    }

    /// Records with zero available units.
    pub fn list_out_of_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        let records = self.store().list_all()?;
        Ok(records
            .into_iter()
            .filter(|r| StockStatus::classify(r) == StockStatus::OutOfStock)
            .collect())
    }

    /// Records whose status calls for replenishment.
    pub fn list_needing_restock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        let records = self.store().list_all()?;
        Ok(records
            .into_iter()
            .filter(|r| StockStatus::classify(r).needs_restock())
            .collect())
    }
}
