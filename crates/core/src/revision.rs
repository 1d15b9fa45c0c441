//! Optimistic concurrency token.

/// Revision expectation for a conditional write.
///
/// A record's `revision` increases by exactly one per committed mutation.
/// A caller reads the record at revision `r`, applies a transition, then
/// writes back expecting `Exact(r)`; a mismatch means someone else committed
/// in between and the caller must re-read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// Skip the revision check (migrations, administrative repair).
    Any,
    /// Require the stored record to be at an exact revision.
    Exact(u64),
}

impl ExpectedRevision {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::Exact(r) => r == actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_only_its_own_revision() {
        assert!(ExpectedRevision::Exact(3).matches(3));
        assert!(!ExpectedRevision::Exact(3).matches(4));
        assert!(!ExpectedRevision::Exact(3).matches(2));
    }

    #[test]
    fn any_matches_everything() {
        assert!(ExpectedRevision::Any.matches(0));
        assert!(ExpectedRevision::Any.matches(u64::MAX));
    }
}
