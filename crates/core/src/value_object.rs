//! Value object trait: equality by value, not identity.

/// Marker trait for immutable, value-compared domain objects.
///
/// A value object has no identity of its own; two instances with the same
/// attribute values are interchangeable (a natural key, a pair of stock
/// levels). Entities, by contrast, are identified by their id regardless of
/// attribute values.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
