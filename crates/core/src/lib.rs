//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod revision;
pub mod value_object;

pub use entity::Entity;
pub use error::{StockError, StockResult};
pub use id::{ActorId, LocationId, ProductId, RecordId, VariantId};
pub use revision::ExpectedRevision;
pub use value_object::ValueObject;
