//! Identity seam for stored records.

/// A record identified by a stable id, not by its attribute values.
///
/// Two snapshots of the same record compare equal on `id()` even when their
/// quantities or bookkeeping differ. Identifiers in this workspace are small
/// `Copy` newtypes over UUIDs, so the id is returned by value.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
