//! Infrastructure layer: record storage, the concurrency coordinator, and
//! the ledger service surface.

pub mod catalog;
pub mod coordinator;
pub mod ledger;
pub mod record_store;


pub use catalog::StaticCatalog;
pub use coordinator::{Coordinator, LedgerError, MAX_ATTEMPTS};
pub use ledger::{BatchOutcome, InventoryLedger};
pub use record_store::{InMemoryRecordStore, PostgresRecordStore, RecordStore, RecordStoreError};
