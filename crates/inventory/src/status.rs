//! Threshold classification of a record's current counters.

use serde::{Deserialize, Serialize};

use crate::record::InventoryRecord;

/// Stock health derived from a record's counters. Never stored; recomputed
/// on demand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Classify a record. Precedence: out-of-stock before low-stock.
    pub fn classify(record: &InventoryRecord) -> Self {
        let available = record.available_quantity();
        if available == 0 {
            StockStatus::OutOfStock
        } else if available <= record.reorder_level {
            StockStatus::LowStock
        } else {
            StockStatus::Ok
        }
    }

    /// Whether this status should appear in the needs-restock view.
    pub fn needs_restock(self) -> bool {
        matches!(self, StockStatus::LowStock | StockStatus::OutOfStock)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::Ok => "ok",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}
