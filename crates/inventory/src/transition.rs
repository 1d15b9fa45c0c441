//! Pure stock transitions (the reservation engine).
//!
//! A transition validates its precondition against one record and returns the
//! mutated copy, or a [`StockError`] describing the business outcome. No IO,
//! no partial state: the caller either commits the returned record or drops
//! it.

use chrono::{DateTime, Utc};

use stockledger_core::{ActorId, StockError, StockResult};

use crate::event::ChangeKind;
use crate::record::InventoryRecord;

/// A requested mutation of one inventory record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockTransition {
    /// Correct the physical count by `delta` (cycle count, damage, shrinkage).
    Adjust { delta: i64 },
    /// Hold `qty` units against a pending order.
    Reserve { qty: i64 },
    /// Return `qty` previously reserved units to the available pool.
    Release { qty: i64 },
    /// Ship `qty` reserved units: they leave both the reservation and the
    /// physical count.
    Fulfill { qty: i64 },
    /// Receive `qty` new units into stock.
    Restock { qty: i64 },
    /// Change the low-stock alert threshold.
    SetReorderLevel { level: i64 },
    /// Change (or clear) the informational capacity bound.
    SetMaxLevel { level: Option<i64> },
}

impl StockTransition {
    /// Event kind announced when this transition commits.
    pub fn kind(&self) -> ChangeKind {
        match self {
            StockTransition::Adjust { .. } => ChangeKind::StockUpdated,
            StockTransition::Reserve { .. } => ChangeKind::Reserved,
            StockTransition::Release { .. } => ChangeKind::Released,
            StockTransition::Fulfill { .. } => ChangeKind::Fulfilled,
            StockTransition::Restock { .. } => ChangeKind::Restocked,
            StockTransition::SetReorderLevel { .. } => ChangeKind::StockUpdated,
            StockTransition::SetMaxLevel { .. } => ChangeKind::StockUpdated,
        }
    }

    /// Apply this transition to `record`, producing the mutated copy.
    ///
    /// The returned record carries updated bookkeeping (`last_updated_at`,
    /// `updated_by`, `last_restocked_at` for restocks) but an unchanged
    /// `revision`; the store bumps that at commit time.
    pub fn apply(
        &self,
        record: &InventoryRecord,
        actor: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> StockResult<InventoryRecord> {
        let mut next = record.clone();

        match *self {
            StockTransition::Adjust { delta } => {
                if delta == 0 {
                    return Err(StockError::validation("adjustment delta cannot be zero"));
                }
                let total = checked_add(record.total_quantity, delta)?;
                if total < 0 {
                    return Err(StockError::NegativeStock {
                        total: record.total_quantity,
                        delta,
                    });
                }
                if total < record.reserved_quantity {
                    // Shrinking below the reserved holdings would break the
                    // reservation ledger.
                    return Err(StockError::NegativeStock {
                        total: record.total_quantity,
                        delta,
                    });
                }
                next.total_quantity = total;
            }
            StockTransition::Reserve { qty } => {
                require_positive(qty, "reserve")?;
                let available = record.available_quantity();
                if available < qty {
                    return Err(StockError::InsufficientStock {
                        requested: qty,
                        available,
                    });
                }
                next.reserved_quantity += qty;
            }
            StockTransition::Release { qty } => {
                require_positive(qty, "release")?;
                if qty > record.reserved_quantity {
                    return Err(StockError::OverRelease {
                        requested: qty,
                        reserved: record.reserved_quantity,
                    });
                }
                next.reserved_quantity -= qty;
            }
            StockTransition::Fulfill { qty } => {
                require_positive(qty, "fulfill")?;
                if qty > record.reserved_quantity || qty > record.total_quantity {
                    return Err(StockError::InsufficientReservedStock {
                        requested: qty,
                        reserved: record.reserved_quantity,
                    });
                }
                next.total_quantity -= qty;
                next.reserved_quantity -= qty;
            }
            StockTransition::Restock { qty } => {
                require_positive(qty, "restock")?;
                next.total_quantity = checked_add(record.total_quantity, qty)?;
                next.last_restocked_at = Some(now);
            }
            StockTransition::SetReorderLevel { level } => {
                if level < 0 {
                    return Err(StockError::validation(format!(
                        "reorder level cannot be negative (got {level})"
                    )));
                }
                next.reorder_level = level;
            }
            StockTransition::SetMaxLevel { level } => {
                if let Some(level) = level {
                    if level < 0 {
                        return Err(StockError::validation(format!(
                            "max level cannot be negative (got {level})"
                        )));
                    }
                }
                next.max_level = level;
            }
        }

        next.last_updated_at = now;
        next.updated_by = actor;
        Ok(next)
    }
}

fn require_positive(qty: i64, operation: &str) -> StockResult<()> {
    if qty <= 0 {
        return Err(StockError::validation(format!(
            "{operation} quantity must be positive (got {qty})"
        )));
    }
    Ok(())
}

fn checked_add(total: i64, delta: i64) -> StockResult<i64> {
    total
        .checked_add(delta)
        .ok_or_else(|| StockError::validation("quantity arithmetic overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use stockledger_core::{ProductId, RecordId};

    use crate::record::NaturalKey;

    fn record_with(total: i64, reserved: i64) -> InventoryRecord {
        let mut record = InventoryRecord::new(
            RecordId::new(),
            NaturalKey::product(ProductId::new()),
            total,
            None,
            Utc::now(),
        )
        .unwrap();
        record.reserved_quantity = reserved;
        record
    }

    fn apply(record: &InventoryRecord, t: StockTransition) -> StockResult<InventoryRecord> {
        t.apply(record, None, Utc::now())
    }

    #[test]
    fn reserve_holds_stock_without_touching_total() {
        let record = record_with(10, 0);
        let next = apply(&record, StockTransition::Reserve { qty: 7 }).unwrap();
        assert_eq!(next.total_quantity, 10);
        assert_eq!(next.reserved_quantity, 7);
        assert_eq!(next.available_quantity(), 3);
    }

    #[test]
    fn reserve_beyond_available_fails() {
        let record = record_with(10, 7);
        let err = apply(&record, StockTransition::Reserve { qty: 5 }).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 5,
                available: 3,
            }
        );
    }

    #[test]
    fn fulfill_converts_reservation_into_decrement() {
        let record = record_with(10, 7);
        let next = apply(&record, StockTransition::Fulfill { qty: 7 }).unwrap();
        assert_eq!(next.total_quantity, 3);
        assert_eq!(next.reserved_quantity, 0);
        assert_eq!(next.available_quantity(), 3);
    }

    #[test]
    fn fulfill_beyond_reserved_fails() {
        let record = record_with(10, 2);
        let err = apply(&record, StockTransition::Fulfill { qty: 3 }).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientReservedStock {
                requested: 3,
                reserved: 2,
            }
        );
    }

    #[test]
    fn release_returns_held_stock() {
        let record = record_with(10, 4);
        let next = apply(&record, StockTransition::Release { qty: 4 }).unwrap();
        assert_eq!(next.reserved_quantity, 0);
        assert_eq!(next.available_quantity(), 10);
    }

    #[test]
    fn release_beyond_reserved_is_rejected_never_clamped() {
        let record = record_with(10, 2);
        let err = apply(&record, StockTransition::Release { qty: 3 }).unwrap_err();
        assert_eq!(
            err,
            StockError::OverRelease {
                requested: 3,
                reserved: 2,
            }
        );
    }

    #[test]
    fn adjust_cannot_drive_total_negative() {
        let record = record_with(3, 0);
        let err = apply(&record, StockTransition::Adjust { delta: -4 }).unwrap_err();
        assert_eq!(err, StockError::NegativeStock { total: 3, delta: -4 });
    }

    #[test]
    fn adjust_cannot_shrink_below_reserved() {
        let record = record_with(10, 6);
        let err = apply(&record, StockTransition::Adjust { delta: -5 }).unwrap_err();
        assert_eq!(err, StockError::NegativeStock { total: 10, delta: -5 });
    }

    #[test]
    fn restock_adds_and_stamps_restock_time() {
        let record = record_with(1, 0);
        let next = apply(&record, StockTransition::Restock { qty: 9 }).unwrap();
        assert_eq!(next.total_quantity, 10);
        assert!(next.last_restocked_at.is_some());
    }

    #[test]
    fn non_positive_quantities_are_validation_errors() {
        let record = record_with(10, 5);
        for t in [
            StockTransition::Reserve { qty: 0 },
            StockTransition::Release { qty: -1 },
            StockTransition::Fulfill { qty: 0 },
            StockTransition::Restock { qty: -3 },
            StockTransition::Adjust { delta: 0 },
        ] {
            assert!(matches!(apply(&record, t), Err(StockError::Validation(_))));
        }
    }

    #[test]
    fn reserve_then_overreserve_then_fulfill_scenario() {
        let record = record_with(10, 0);

        let after_reserve = apply(&record, StockTransition::Reserve { qty: 7 }).unwrap();
        assert_eq!(after_reserve.available_quantity(), 3);

        let err = apply(&after_reserve, StockTransition::Reserve { qty: 5 }).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 5,
                available: 3,
            }
        );

        let after_fulfill = apply(&after_reserve, StockTransition::Fulfill { qty: 7 }).unwrap();
        assert_eq!(after_fulfill.total_quantity, 3);
        assert_eq!(after_fulfill.reserved_quantity, 0);
        assert_eq!(after_fulfill.available_quantity(), 3);
    }

    #[test]
    fn reorder_level_update_leaves_quantities_alone() {
        let record = record_with(10, 2);
        let next = apply(&record, StockTransition::SetReorderLevel { level: 8 }).unwrap();
        assert_eq!(next.reorder_level, 8);
        assert_eq!(next.total_quantity, 10);
        assert_eq!(next.reserved_quantity, 2);
    }

    #[test]
    fn max_level_can_be_set_and_cleared() {
        let record = record_with(10, 0);
        let capped = apply(&record, StockTransition::SetMaxLevel { level: Some(50) }).unwrap();
        assert_eq!(capped.max_level, Some(50));

        let cleared = apply(&capped, StockTransition::SetMaxLevel { level: None }).unwrap();
        assert_eq!(cleared.max_level, None);
    }

    #[test]
    fn negative_levels_are_validation_errors() {
        let record = record_with(10, 0);
        assert!(matches!(
            apply(&record, StockTransition::SetReorderLevel { level: -1 }),
            Err(StockError::Validation(_))
        ));
        assert!(matches!(
            apply(&record, StockTransition::SetMaxLevel { level: Some(-5) }),
            Err(StockError::Validation(_))
        ));
    }

    #[test]
    fn transitions_do_not_bump_revision() {
        let mut record = record_with(10, 0);
        record.revision = 4;
        let next = apply(&record, StockTransition::Reserve { qty: 1 }).unwrap();
        assert_eq!(next.revision, 4);
    }

    fn arb_transition() -> impl Strategy<Value = StockTransition> {
        prop_oneof![
            (-20i64..20).prop_map(|delta| StockTransition::Adjust { delta }),
            (1i64..15).prop_map(|qty| StockTransition::Reserve { qty }),
            (1i64..15).prop_map(|qty| StockTransition::Release { qty }),
            (1i64..15).prop_map(|qty| StockTransition::Fulfill { qty }),
            (1i64..15).prop_map(|qty| StockTransition::Restock { qty }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: applying any sequence of transitions one at a time, the
        /// accepted ones always leave `0 <= reserved <= total` and a derived
        /// available of exactly `total - reserved`.
        #[test]
        fn invariants_hold_after_every_accepted_transition(
            initial in 0i64..30,
            transitions in prop::collection::vec(arb_transition(), 1..40)
        ) {
            let mut record = record_with(initial, 0);

            for t in transitions {
                match t.apply(&record, None, Utc::now()) {
                    Ok(next) => record = next,
                    Err(_) => continue, // rejected: record must be untouched
                }

                prop_assert!(record.reserved_quantity >= 0);
                prop_assert!(record.reserved_quantity <= record.total_quantity);
                prop_assert_eq!(
                    record.available_quantity(),
                    record.total_quantity - record.reserved_quantity
                );
                prop_assert!(record.available_quantity() >= 0);
                prop_assert!(record.check_invariants().is_ok());
            }
        }

        /// Property: a release larger than the current reservation always
        /// fails with `OverRelease` and never silently clamps.
        #[test]
        fn over_release_always_rejects(
            total in 0i64..30,
            reserved_frac in 0i64..30,
            excess in 1i64..10
        ) {
            let reserved = reserved_frac.min(total);
            let record = record_with(total, reserved);
            let qty = reserved + excess;

            let result = StockTransition::Release { qty }.apply(&record, None, Utc::now());
            prop_assert_eq!(
                result.unwrap_err(),
                StockError::OverRelease { requested: qty, reserved }
            );
        }
    }
}
