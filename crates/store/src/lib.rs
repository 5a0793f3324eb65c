//! Store capability surface for the stress harness
//!
//! The harness never looks inside the store. Everything it needs is expressed
//! by two traits:
//! - [`Store`]: opens sessions against one database
//! - [`Session`]: executes statements and queries with positional parameters,
//!   toggles autocommit, and issues the administrative shutdown
//!
//! Sessions are owned by exactly one worker; they are `Send` but never shared.
//! [`SqliteStore`] is the bundled backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sqlite;
mod value;

pub use sqlite::{SqliteSession, SqliteStore};
pub use value::{Row, SqlValue};

use stress_core::{SessionOptions, StorageMode, StoreResult};

/// A transactional store reachable through sessions
pub trait Store: Send + Sync {
    /// Session type produced by this store
    type Session: Session;

    /// Open a new session. After a shutdown this restarts the store.
    fn open_session(&self) -> StoreResult<Self::Session>;

    /// Options every session is opened with
    fn options(&self) -> SessionOptions;

    /// Backing storage of this store
    fn storage_mode(&self) -> StorageMode {
        self.options().storage_mode
    }
}

/// One client session. Not safe for concurrent use; owned by one worker.
pub trait Session: Send {
    /// Execute a DDL/DML statement, returning the number of affected rows
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize>;

    /// Run a query, returning every row
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>>;

    /// Insert-or-replace one row by primary key
    fn upsert(&mut self, table: &str, values: &[SqlValue]) -> StoreResult<()>;

    /// Toggle autocommit. Turning it back on commits the open transaction.
    fn set_autocommit(&mut self, autocommit: bool) -> StoreResult<()>;

    /// Commit the open transaction, if any
    fn commit(&mut self) -> StoreResult<()>;

    /// Roll back the open transaction, if any
    fn rollback(&mut self) -> StoreResult<()>;

    /// Administrative shutdown: closes every session of the store
    fn shutdown(&mut self) -> StoreResult<()>;

    /// Close the session, rolling back any open transaction
    fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}
