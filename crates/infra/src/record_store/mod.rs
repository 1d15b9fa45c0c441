//! Durable keyed storage of inventory records.

pub mod in_memory;
pub mod postgres;
mod r#trait;

pub use in_memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use r#trait::{RecordStore, RecordStoreError};
