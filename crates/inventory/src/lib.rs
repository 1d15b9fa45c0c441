//! Inventory ledger domain module.
//!
//! This crate contains the business rules for stock tracking: the inventory
//! record, the reserve/release/fulfill/restock transitions, and the threshold
//! classification. All of it is deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod catalog;
pub mod event;
pub mod record;
pub mod status;
pub mod transition;

pub use catalog::ProductCatalog;
pub use event::{ChangeEvent, ChangeKind, StockLevels};
pub use record::{DEFAULT_REORDER_LEVEL, InventoryRecord, NaturalKey};
pub use status::StockStatus;
pub use transition::StockTransition;
