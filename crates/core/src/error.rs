//! Error types for the stress harness
//!
//! Three layers, each a `thiserror` type:
//! - [`StoreError`]: raised by a store session, carrying a machine-readable kind
//! - [`WorkerError`]: the terminal failure a Task captures from its work
//! - [`HarnessError`]: errors of the harness itself (setup, lifecycle, config)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for harness operations
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Machine-distinguishable classification of a store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// Lock wait exceeded the configured lock timeout
    LockTimeout,
    /// Primary key or other constraint rejected the statement
    ConstraintViolation,
    /// The session was closed, typically by a store shutdown
    ConnectionClosed,
    /// The store detected a deadlock and chose this session as victim
    Deadlock,
    /// The store failed to read or write its files
    Io,
    /// Anything the backend could not classify
    Other,
}

impl StoreErrorKind {
    /// Every kind, in declaration order
    pub fn all() -> [StoreErrorKind; 6] {
        [
            StoreErrorKind::LockTimeout,
            StoreErrorKind::ConstraintViolation,
            StoreErrorKind::ConnectionClosed,
            StoreErrorKind::Deadlock,
            StoreErrorKind::Io,
            StoreErrorKind::Other,
        ]
    }

    /// Stable name used in config files and failure logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::LockTimeout => "lock_timeout",
            StoreErrorKind::ConstraintViolation => "constraint_violation",
            StoreErrorKind::ConnectionClosed => "connection_closed",
            StoreErrorKind::Deadlock => "deadlock",
            StoreErrorKind::Io => "io",
            StoreErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreErrorKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreErrorKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HarnessError::Config(format!("unknown store error kind '{}'", s)))
    }
}

/// Error raised by a store session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    /// Classification used by error policies
    pub kind: StoreErrorKind,
    /// Backend-provided message
    pub message: String,
}

impl StoreError {
    /// Create an error of the given kind
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        StoreError {
            kind,
            message: message.into(),
        }
    }

    /// Session used after its store was shut down or after close
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::ConnectionClosed, message)
    }

    /// Unclassified backend failure
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, message)
    }
}

/// Terminal failure captured from a Task's work
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    /// A store call failed while performing `operation`
    #[error("{operation} failed: {source}")]
    Store {
        /// Human-readable description of the statement or operation
        operation: String,
        /// The store error
        #[source]
        source: StoreError,
    },

    /// The work observed a result it did not expect
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The work panicked; the payload message is preserved
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    /// Attach the operation that triggered a store error
    pub fn store(operation: impl fmt::Display, source: StoreError) -> Self {
        WorkerError::Store {
            operation: operation.to_string(),
            source,
        }
    }

    /// Store error kind, if this failure came from the store
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            WorkerError::Store { source, .. } => Some(source.kind),
            _ => None,
        }
    }

    /// Operation label, if known
    pub fn operation(&self) -> Option<&str> {
        match self {
            WorkerError::Store { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Stable kind label for failure logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            WorkerError::Store { source, .. } => source.kind.as_str(),
            WorkerError::Assertion(_) => "assertion",
            WorkerError::Panicked(_) => "panic",
        }
    }
}

/// Errors of the harness itself
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The OS refused to start a worker thread
    #[error("failed to spawn task '{name}': {source}")]
    Spawn {
        /// Task name
        name: String,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Store failure during scenario setup or verification
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A Task was driven through an invalid lifecycle transition
    #[error("task lifecycle error: {0}")]
    Lifecycle(String),

    /// A scenario finished with a failing verdict
    #[error("scenario '{scenario}' failed with {failures} failure(s)")]
    ScenarioFailed {
        /// Scenario name
        scenario: String,
        /// Number of recorded failures
        failures: usize,
    },

    /// I/O error (data directories, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
