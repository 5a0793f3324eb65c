//! Error classification policy
//!
//! Decides which store errors a worker may absorb and keep going. The default
//! policy is strict: nothing is acceptable, so every worker error, including
//! a lock timeout under heavy contention, fails the scenario.

use std::collections::HashSet;
use stress_core::{StoreError, StoreErrorKind, WorkerError};

/// Set of store error kinds treated as benign
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    acceptable: HashSet<StoreErrorKind>,
}

impl ErrorPolicy {
    /// Nothing is acceptable
    pub fn strict() -> Self {
        Self::default()
    }

    /// Accept exactly the given kinds
    pub fn tolerating(kinds: impl IntoIterator<Item = StoreErrorKind>) -> Self {
        ErrorPolicy {
            acceptable: kinds.into_iter().collect(),
        }
    }

    /// Enumerated benign outcome of racing a shutdown: a session closed
    /// underneath its owner.
    pub fn shutdown_race() -> Self {
        Self::tolerating([StoreErrorKind::ConnectionClosed])
    }

    /// True if nothing is acceptable
    pub fn is_strict(&self) -> bool {
        self.acceptable.is_empty()
    }

    /// Whether a store error may be absorbed
    pub fn accepts(&self, error: &StoreError) -> bool {
        self.acceptable.contains(&error.kind)
    }

    /// Whether a captured worker failure is benign
    pub fn accepts_failure(&self, failure: &WorkerError) -> bool {
        failure
            .store_kind()
            .map(|kind| self.acceptable.contains(&kind))
            .unwrap_or(false)
    }
}
