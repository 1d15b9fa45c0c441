//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Deterministic business outcome of a stock transition.
///
/// These are expected results returned to the caller, never retried
/// automatically. Infrastructure concerns (storage faults, write conflicts)
/// belong to the store layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An adjustment would drive the total quantity below zero.
    #[error("adjustment would drive stock negative (total: {total}, delta: {delta})")]
    NegativeStock { total: i64, delta: i64 },

    /// A reservation asked for more than is currently available.
    #[error("insufficient stock (requested: {requested}, available: {available})")]
    InsufficientStock { requested: i64, available: i64 },

    /// A release asked for more than is currently reserved.
    ///
    /// Releases are rejected rather than clamped so the reservation ledger
    /// stays auditable.
    #[error("cannot release more than reserved (requested: {requested}, reserved: {reserved})")]
    OverRelease { requested: i64, reserved: i64 },

    /// A fulfillment asked for more than is currently reserved.
    #[error("insufficient reserved stock (requested: {requested}, reserved: {reserved})")]
    InsufficientReservedStock { requested: i64, reserved: i64 },
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
