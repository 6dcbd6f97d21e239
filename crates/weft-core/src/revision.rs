//! Signed revision counters.
//!
//! Revisions are strictly monotonically increasing per pool and per process
//! and serve as the optimistic-concurrency token. Binding events reuse the
//! signed space: a positive revision grants a binding, the negation of that
//! revision revokes it.

use serde::{Deserialize, Serialize};

/// A signed 64-bit revision counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// The revision a freshly created pool or process starts at.
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Wrap a raw signed revision.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw signed value.
    pub const fn value(self) -> i64 {
        self.0
    }

    /// The next revision in the monotonic sequence.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The revoking counterpart of a granting revision.
    pub const fn negated(self) -> Self {
        Self(-self.0)
    }

    /// Whether this revision grants a binding (positive) rather than
    /// revoking one (negative).
    pub const fn is_grant(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_revoke_are_negations() {
        let granted = Revision::initial().next();
        assert!(granted.is_grant());
        let revoked = granted.negated();
        assert!(!revoked.is_grant());
        assert_eq!(revoked.negated(), granted);
    }
}
