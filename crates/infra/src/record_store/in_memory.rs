use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::{ExpectedRevision, LocationId, ProductId, RecordId};
use stockledger_inventory::{InventoryRecord, NaturalKey};

use super::r#trait::{RecordStore, RecordStoreError};

#[derive(Debug, Default)]
struct Tables {
    by_id: HashMap<RecordId, InventoryRecord>,
    by_key: HashMap<NaturalKey, RecordId>,
}

/// In-memory record store.
///
/// Intended for tests/dev. The whole store sits behind one `RwLock`, so the
/// duplicate check on insert and the revision check on save are atomic with
/// their writes, matching what the Postgres store gets from its constraints
/// and conditional UPDATE.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, RecordStoreError> {
        self.tables
            .write()
            .map_err(|_| RecordStoreError::Storage("lock poisoned".to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, RecordStoreError> {
        self.tables
            .read()
            .map_err(|_| RecordStoreError::Storage("lock poisoned".to_string()))
    }
}

fn check_invariants(record: &InventoryRecord) -> Result<(), RecordStoreError> {
    record
        .check_invariants()
        .map_err(|e| RecordStoreError::Storage(format!("refusing to commit invalid record: {e}")))
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, mut record: InventoryRecord) -> Result<InventoryRecord, RecordStoreError> {
        check_invariants(&record)?;

        let mut tables = self.write()?;
        if tables.by_key.contains_key(&record.key) || tables.by_id.contains_key(&record.id) {
            return Err(RecordStoreError::DuplicateRecord(record.key));
        }

        record.revision = 1;
        tables.by_key.insert(record.key, record.id);
        tables.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    fn get(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        self.read()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RecordStoreError::NotFound)
    }

    fn get_by_key(&self, key: &NaturalKey) -> Result<InventoryRecord, RecordStoreError> {
        let tables = self.read()?;
        tables
            .by_key
            .get(key)
            .and_then(|id| tables.by_id.get(id))
            .cloned()
            .ok_or(RecordStoreError::NotFound)
    }

    fn list_all(&self) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        Ok(self.read()?.by_id.values().cloned().collect())
    }

    fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        Ok(self
            .read()?
            .by_id
            .values()
            .filter(|r| r.key.product_id == product_id)
            .cloned()
            .collect())
    }

    fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        Ok(self
            .read()?
            .by_id
            .values()
            .filter(|r| r.key.location_id == Some(location_id))
            .cloned()
            .collect())
    }

    fn save(
        &self,
        mut record: InventoryRecord,
        expected: ExpectedRevision,
    ) -> Result<InventoryRecord, RecordStoreError> {
        check_invariants(&record)?;

        let mut tables = self.write()?;
        let current = tables
            .by_id
            .get(&record.id)
            .ok_or(RecordStoreError::NotFound)?;

        if current.key != record.key {
            return Err(RecordStoreError::Storage(
                "natural key is immutable".to_string(),
            ));
        }
        if !expected.matches(current.revision) {
            return Err(RecordStoreError::Concurrency(format!(
                "expected {expected:?}, found {}",
                current.revision
            )));
        }

        record.revision = current.revision + 1;
        tables.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    fn remove(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        let mut tables = self.write()?;
        let reserved = tables
            .by_id
            .get(&id)
            .ok_or(RecordStoreError::NotFound)?
            .reserved_quantity;

        if reserved > 0 {
            return Err(RecordStoreError::ReservedStock { reserved });
        }

        let removed = tables.by_id.remove(&id).ok_or(RecordStoreError::NotFound)?;
        tables.by_key.remove(&removed.key);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_record(total: i64) -> InventoryRecord {
        InventoryRecord::new(
            RecordId::new(),
            NaturalKey::product(ProductId::new()),
            total,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn insert_assigns_revision_one() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(10)).unwrap();
        assert_eq!(committed.revision, 1);
        assert_eq!(store.get(committed.id).unwrap(), committed);
        assert_eq!(store.get_by_key(&committed.key).unwrap(), committed);
    }

    #[test]
    fn duplicate_natural_key_is_rejected() {
        let store = InMemoryRecordStore::new();
        let first = store.insert(new_record(10)).unwrap();

        let mut clash = new_record(3);
        clash.key = first.key;
        assert!(matches!(
            store.insert(clash),
            Err(RecordStoreError::DuplicateRecord(_))
        ));
    }

    #[test]
    fn save_bumps_revision_by_exactly_one() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(10)).unwrap();

        let mut update = committed.clone();
        update.total_quantity = 12;
        let saved = store
            .save(update, ExpectedRevision::Exact(committed.revision))
            .unwrap();
        assert_eq!(saved.revision, 2);
        assert_eq!(store.get(saved.id).unwrap().total_quantity, 12);
    }

    #[test]
    fn stale_revision_is_a_concurrency_error() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(10)).unwrap();

        let mut first = committed.clone();
        first.total_quantity = 11;
        store
            .save(first, ExpectedRevision::Exact(1))
            .unwrap();

        // Second writer still holds revision 1.
        let mut second = committed.clone();
        second.total_quantity = 15;
        assert!(matches!(
            store.save(second, ExpectedRevision::Exact(1)),
            Err(RecordStoreError::Concurrency(_))
        ));
        // The losing write changed nothing.
        assert_eq!(store.get(committed.id).unwrap().total_quantity, 11);
    }

    #[test]
    fn save_of_unknown_record_is_not_found() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(
            store.save(new_record(1), ExpectedRevision::Any),
            Err(RecordStoreError::NotFound)
        ));
    }

    #[test]
    fn invalid_record_is_never_committed() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(5)).unwrap();

        let mut broken = committed.clone();
        broken.reserved_quantity = 6;
        assert!(matches!(
            store.save(broken, ExpectedRevision::Exact(1)),
            Err(RecordStoreError::Storage(_))
        ));
        assert_eq!(store.get(committed.id).unwrap().reserved_quantity, 0);
    }

    #[test]
    fn remove_refuses_while_stock_is_reserved() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(5)).unwrap();

        let mut reserved = committed.clone();
        reserved.reserved_quantity = 2;
        store
            .save(reserved, ExpectedRevision::Exact(1))
            .unwrap();

        assert!(matches!(
            store.remove(committed.id),
            Err(RecordStoreError::ReservedStock { reserved: 2 })
        ));
    }

    #[test]
    fn removed_key_can_be_tracked_again() {
        let store = InMemoryRecordStore::new();
        let committed = store.insert(new_record(5)).unwrap();
        store.remove(committed.id).unwrap();

        let mut again = new_record(1);
        again.key = committed.key;
        let fresh = store.insert(again).unwrap();
        assert_eq!(fresh.revision, 1);
    }

    #[test]
    fn listings_filter_by_product_and_location() {
        let store = InMemoryRecordStore::new();
        let product = ProductId::new();
        let location = LocationId::new();

        let mut at_location = new_record(5);
        at_location.key = NaturalKey::product(product).with_location(location);
        store.insert(at_location).unwrap();

        let mut elsewhere = new_record(7);
        elsewhere.key = NaturalKey::product(product);
        store.insert(elsewhere).unwrap();

        store.insert(new_record(9)).unwrap(); // unrelated product

        assert_eq!(store.list_by_product(product).unwrap().len(), 2);
        assert_eq!(store.list_by_location(location).unwrap().len(), 1);
        assert_eq!(store.list_all().unwrap().len(), 3);
    }
}
