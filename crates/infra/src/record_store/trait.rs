use std::sync::Arc;
use thiserror::Error;

use stockledger_core::{ExpectedRevision, LocationId, ProductId, RecordId};
use stockledger_inventory::{InventoryRecord, NaturalKey};

/// Record store operation error.
///
/// Infrastructure outcomes (uniqueness, conflicts, storage faults) as
/// opposed to the deterministic business outcomes in
/// [`stockledger_core::StockError`].
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// The natural key (or record id) is already tracked.
    #[error("a record already tracks {0}")]
    DuplicateRecord(NaturalKey),

    /// No record for the given id or natural key.
    #[error("inventory record not found")]
    NotFound,

    /// The conditional write lost against a concurrent committer.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Removal refused while stock is held against pending orders.
    #[error("record still holds {reserved} reserved unit(s)")]
    ReservedStock { reserved: i64 },

    /// Backend fault (connectivity, poisoned lock, constraint violation).
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Durable CRUD for [`InventoryRecord`], keyed by id and by natural key.
///
/// ## Contract
///
/// - Natural-key uniqueness is enforced here, atomically with the insert,
///   never only in application logic.
/// - `save` is a **conditional write**: it commits with `revision + 1` only
///   if the stored revision still matches the expectation, otherwise it
///   fails with [`RecordStoreError::Concurrency`] and changes nothing. This
///   single-record compare-and-swap is the engine's only serialization
///   point.
/// - The store owns `revision`: callers never pick revision values, they
///   only state expectations.
/// - `remove` refuses while `reserved_quantity > 0`.
/// - Every committed record satisfies the quantity invariants; stores
///   re-check them before writing.
pub trait RecordStore: Send + Sync {
    /// Insert a fresh record; the store assigns revision 1.
    fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, RecordStoreError>;

    fn get(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError>;

    fn get_by_key(&self, key: &NaturalKey) -> Result<InventoryRecord, RecordStoreError>;

    /// All records, in unspecified order.
    fn list_all(&self) -> Result<Vec<InventoryRecord>, RecordStoreError>;

    fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError>;

    fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError>;

    /// Conditional write guarded by `expected` against the stored revision.
    fn save(
        &self,
        record: InventoryRecord,
        expected: ExpectedRevision,
    ) -> Result<InventoryRecord, RecordStoreError>;

    /// Remove a record, returning its final state. Fails with
    /// [`RecordStoreError::ReservedStock`] while units are held.
    fn remove(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError>;
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, RecordStoreError> {
        (**self).insert(record)
    }

    fn get(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        (**self).get(id)
    }

    fn get_by_key(&self, key: &NaturalKey) -> Result<InventoryRecord, RecordStoreError> {
        (**self).get_by_key(key)
    }

    fn list_all(&self) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        (**self).list_all()
    }

    fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        (**self).list_by_product(product_id)
    }

    fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        (**self).list_by_location(location_id)
    }

    fn save(
        &self,
        record: InventoryRecord,
        expected: ExpectedRevision,
    ) -> Result<InventoryRecord, RecordStoreError> {
        (**self).save(record, expected)
    }

    fn remove(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        (**self).remove(id)
    }
}
