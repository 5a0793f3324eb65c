//! Workload operations
//!
//! The operation set a contention worker draws from. Keys are row ids in
//! `[0, row_count)`; values are short strings drawn from the same domain so
//! that repeated writes collide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One request a worker sends to the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Insert-or-replace the row for `key`
    Insert {
        /// Row id
        key: i64,
        /// New value
        value: String,
    },
    /// Overwrite the value of `key` if present
    Update {
        /// Row id
        key: i64,
        /// New value
        value: String,
    },
    /// Remove the row for `key` if present
    Delete {
        /// Row id
        key: i64,
    },
    /// Read the row for `key`
    PointQuery {
        /// Row id
        key: i64,
    },
}

impl Operation {
    /// Row id this operation touches
    pub fn key(&self) -> i64 {
        match self {
            Operation::Insert { key, .. }
            | Operation::Update { key, .. }
            | Operation::Delete { key }
            | Operation::PointQuery { key } => *key,
        }
    }

    /// Whether the operation mutates the store
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::PointQuery { .. })
    }

    /// Short kind name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::PointQuery { .. } => "point_query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert { key, value } | Operation::Update { key, value } => {
                write!(f, "{}({}, {})", self.name(), key, value)
            }
            Operation::Delete { key } | Operation::PointQuery { key } => {
                write!(f, "{}({})", self.name(), key)
            }
        }
    }
}
