//! Bookkeeping for set reconciliation outcomes.
//!
//! Every "set" style operation replaces one side of an association table
//! with a desired set and reports how many rows it inserted, deleted, and
//! left in place. The counters live here so services and repositories agree
//! on their meaning.

/// Row counts reported by a single reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Number of rows inserted.
    pub created: i64,
    /// Number of rows deleted.
    pub removed: i64,
}

/// Outcome of a set operation, including rows the pass left in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// Number of rows inserted.
    pub created: i64,
    /// Number of rows deleted.
    pub removed: i64,
    /// Number of requested rows that already existed, or a sentinel.
    pub untouched: i64,
}

/// Outcome of registering the permissions of one subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    /// Number of catalog rows inserted.
    pub created: i64,
    /// Number of requested rows that already existed, or a sentinel.
    pub untouched: i64,
    /// Number of catalog rows deleted.
    pub removed: i64,
}

/// Derives how many requested entries a reconciliation pass left in place.
///
/// Returns `-1` when `given` is negative and `-2` when it is zero, so an
/// empty request stays distinguishable from a fully replaced set. Clamps to
/// zero when `created` exceeds `given`.
#[must_use]
pub fn untouched(given: i64, created: i64) -> i64 {
    if given < 0 {
        -1
    } else if given == 0 {
        -2
    } else if given < created {
        0
    } else {
        given - created
    }
}
