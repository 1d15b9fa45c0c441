use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    ActorId, Entity, LocationId, ProductId, RecordId, StockError, StockResult, ValueObject,
    VariantId,
};

/// Reorder threshold applied when a record is created without an explicit one.
pub const DEFAULT_REORDER_LEVEL: i64 = 5;

/// Business-meaningful identity of an inventory record: which product is
/// tracked, optionally narrowed to a variant and a warehouse location.
///
/// Distinct from the opaque [`RecordId`]; no two records may share a natural
/// key (the store enforces this).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub location_id: Option<LocationId>,
}

impl NaturalKey {
    /// Key tracking a bare product (no variant, no location).
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            variant_id: None,
            location_id: None,
        }
    }

    pub fn with_variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn with_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

impl ValueObject for NaturalKey {}

impl core::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.product_id)?;
        if let Some(variant) = self.variant_id {
            write!(f, "/{variant}")?;
        }
        if let Some(location) = self.location_id {
            write!(f, "@{location}")?;
        }
        Ok(())
    }
}

/// One row of the inventory ledger.
///
/// Quantities are stored as `i64` and kept non-negative by the transitions
/// and the store's commit checks; available quantity is always derived, never
/// stored. `revision` is owned by the record store: it is 0 until the record
/// is first inserted and then increases by exactly one per committed
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: RecordId,
    pub key: NaturalKey,

    pub total_quantity: i64,
    pub reserved_quantity: i64,

    pub reorder_level: i64,
    pub max_level: Option<i64>,

    pub last_restocked_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub updated_by: Option<ActorId>,

    pub revision: u64,
}

impl InventoryRecord {
    /// Create a record ready for insertion (revision 0; the store assigns 1
    /// at the first commit).
    pub fn new(
        id: RecordId,
        key: NaturalKey,
        initial_quantity: i64,
        actor: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> StockResult<Self> {
        if initial_quantity < 0 {
            return Err(StockError::validation(format!(
                "initial quantity cannot be negative (got {initial_quantity})"
            )));
        }

        Ok(Self {
            id,
            key,
            total_quantity: initial_quantity,
            reserved_quantity: 0,
            reorder_level: DEFAULT_REORDER_LEVEL,
            max_level: None,
            last_restocked_at: None,
            last_updated_at: now,
            updated_by: actor,
            revision: 0,
        })
    }

    /// Units on hand minus units held for pending orders. Derived on every
    /// read; never stored independently.
    pub fn available_quantity(&self) -> i64 {
        self.total_quantity - self.reserved_quantity
    }

    /// Verify the quantity invariants. Transitions preserve these by
    /// construction; stores re-check them before committing.
    pub fn check_invariants(&self) -> StockResult<()> {
        if self.total_quantity < 0 {
            return Err(StockError::validation(format!(
                "total quantity is negative ({})",
                self.total_quantity
            )));
        }
        if self.reserved_quantity < 0 {
            return Err(StockError::validation(format!(
                "reserved quantity is negative ({})",
                self.reserved_quantity
            )));
        }
        if self.reserved_quantity > self.total_quantity {
            return Err(StockError::validation(format!(
                "reserved quantity ({}) exceeds total quantity ({})",
                self.reserved_quantity, self.total_quantity
            )));
        }
        if self.reorder_level < 0 {
            return Err(StockError::validation(format!(
                "reorder level is negative ({})",
                self.reorder_level
            )));
        }
        Ok(())
    }
}

impl Entity for InventoryRecord {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let record = InventoryRecord::new(
            RecordId::new(),
            NaturalKey::product(ProductId::new()),
            10,
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(record.total_quantity, 10);
        assert_eq!(record.reserved_quantity, 0);
        assert_eq!(record.available_quantity(), 10);
        assert_eq!(record.reorder_level, DEFAULT_REORDER_LEVEL);
        assert_eq!(record.max_level, None);
        assert_eq!(record.revision, 0);
        assert_eq!(Entity::id(&record), record.id);
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn negative_initial_quantity_is_rejected() {
        let result = InventoryRecord::new(
            RecordId::new(),
            NaturalKey::product(ProductId::new()),
            -1,
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(StockError::Validation(_))));
    }

    #[test]
    fn invariant_check_catches_over_reservation() {
        let mut record = InventoryRecord::new(
            RecordId::new(),
            NaturalKey::product(ProductId::new()),
            3,
            None,
            Utc::now(),
        )
        .unwrap();
        record.reserved_quantity = 4;
        assert!(record.check_invariants().is_err());
    }

    #[test]
    fn natural_key_display_includes_optional_parts() {
        let product = ProductId::new();
        let variant = VariantId::new();
        let location = LocationId::new();

        let bare = NaturalKey::product(product);
        assert_eq!(bare.to_string(), product.to_string());

        let full = NaturalKey::product(product)
            .with_variant(variant)
            .with_location(location);
        assert_eq!(full.to_string(), format!("{product}/{variant}@{location}"));
    }
}
