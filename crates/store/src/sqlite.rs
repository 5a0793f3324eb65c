//! SQLite backend
//!
//! Maps the store capability surface onto `rusqlite`:
//!
//! | Capability        | SQLite                                            |
//! |-------------------|---------------------------------------------------|
//! | lock timeout      | busy timeout; SQLITE_BUSY/LOCKED -> `LockTimeout` |
//! | autocommit off    | `BEGIN` issued lazily before the next statement   |
//! | upsert            | `INSERT OR REPLACE`                               |
//! | persistent mode   | one WAL-mode database file per store              |
//! | memory mode       | shared in-process `memdb` database                |
//! | shutdown          | close every open session, then checkpoint         |
//!
//! ## Shutdown and restart
//!
//! Every session registers its connection with the store. A shutdown bumps
//! the store's epoch and drops every registered connection, which rolls back
//! whatever transaction it still had open and releases its locks, even if the
//! owner is idle. Sessions from an older epoch fail with `ConnectionClosed`.
//! The next `open_session` restarts the store. In memory mode the restart
//! starts from an empty database.

use crate::value::{Row, SqlValue};
use crate::{Session, Store};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use stress_core::{SessionOptions, StorageMode, StoreError, StoreErrorKind, StoreResult};
use tracing::{debug, info, warn};

/// Database file created inside a persistent store's directory.
pub const DATABASE_FILE_NAME: &str = "stress.db";

enum Location {
    Memory,
    File(PathBuf),
}

/// In-memory database kept alive by a dedicated connection
struct MemoryDatabase {
    uri: String,
    _keeper: Connection,
}

impl MemoryDatabase {
    fn create() -> StoreResult<Self> {
        let uri = format!("file:/strata-stress-{}?vfs=memdb", uuid::Uuid::new_v4());
        let keeper = Connection::open_with_flags(&uri, OpenFlags::default()).map_err(map_error)?;
        Ok(MemoryDatabase {
            uri,
            _keeper: keeper,
        })
    }
}

/// A session's connection, shared with the store so a shutdown can close it.
/// `None` once the session was closed.
type ConnectionSlot = Arc<Mutex<Option<Connection>>>;

struct Lifecycle {
    running: bool,
    memory: Option<MemoryDatabase>,
    /// Connections of every session opened since the last shutdown
    sessions: Vec<Weak<Mutex<Option<Connection>>>>,
}

struct StoreState {
    /// Bumped by every shutdown
    epoch: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
}

/// SQLite-backed [`Store`]
pub struct SqliteStore {
    location: Location,
    options: SessionOptions,
    state: Arc<StoreState>,
}

impl SqliteStore {
    /// Create a shared in-memory store
    pub fn in_memory(options: SessionOptions) -> StoreResult<Self> {
        let memory = MemoryDatabase::create()?;
        debug!(target: "stress::store", uri = %memory.uri, "Created in-memory store");
        Ok(SqliteStore {
            location: Location::Memory,
            options: SessionOptions {
                storage_mode: StorageMode::Memory,
                ..options
            },
            state: Self::new_state(Some(memory)),
        })
    }

    /// Open (or create) a file-backed store in `dir`
    pub fn persistent(dir: impl AsRef<Path>, options: SessionOptions) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StoreError::new(
                StoreErrorKind::Io,
                format!("Failed to create store directory '{}': {}", dir.display(), e),
            )
        })?;
        let path = dir.join(DATABASE_FILE_NAME);

        // WAL mode is persistent in the file, so it is set once here rather
        // than racing on it from every session.
        let conn = Connection::open(&path).map_err(map_error)?;
        conn.busy_timeout(options.lock_timeout).map_err(map_error)?;
        let journal: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(map_error)?;
        debug!(target: "stress::store", path = ?path, journal = %journal, "Opened persistent store");

        Ok(SqliteStore {
            location: Location::File(path),
            options: SessionOptions {
                storage_mode: StorageMode::Persistent,
                ..options
            },
            state: Self::new_state(None),
        })
    }

    /// Open a store for `options.storage_mode`; `dir` is used in persistent mode
    pub fn open(options: SessionOptions, dir: impl AsRef<Path>) -> StoreResult<Self> {
        match options.storage_mode {
            StorageMode::Memory => Self::in_memory(options),
            StorageMode::Persistent => Self::persistent(dir, options),
        }
    }

    /// Number of shutdowns this store has seen
    pub fn epoch(&self) -> u64 {
        self.state.epoch.load(Ordering::SeqCst)
    }

    /// Database file, for persistent stores
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Sessions opened since the last shutdown that are still open
    pub fn open_sessions(&self) -> usize {
        self.state
            .lifecycle
            .lock()
            .sessions
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    fn new_state(memory: Option<MemoryDatabase>) -> Arc<StoreState> {
        Arc::new(StoreState {
            epoch: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle {
                running: true,
                memory,
                sessions: Vec::new(),
            }),
        })
    }

    fn open_connection(&self, target: &str) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(target, OpenFlags::default()).map_err(map_error)?;
        conn.busy_timeout(self.options.lock_timeout)
            .map_err(map_error)?;
        if let Location::File(_) = self.location {
            conn.execute_batch("PRAGMA synchronous = NORMAL")
                .map_err(map_error)?;
        }
        Ok(conn)
    }
}

impl Store for SqliteStore {
    type Session = SqliteSession;

    fn open_session(&self) -> StoreResult<SqliteSession> {
        // Registration and the epoch read happen under the lifecycle lock, so
        // a concurrent shutdown either sees this session or makes it stale.
        let mut lifecycle = self.state.lifecycle.lock();
        if !lifecycle.running {
            info!(
                target: "stress::store",
                mode = %self.options.storage_mode,
                epoch = self.epoch(),
                "Restarting store after shutdown"
            );
            if let Location::Memory = self.location {
                lifecycle.memory = Some(MemoryDatabase::create()?);
            }
            lifecycle.running = true;
        }
        let target = match &self.location {
            Location::File(path) => path.to_string_lossy().into_owned(),
            Location::Memory => lifecycle
                .memory
                .as_ref()
                .map(|memory| memory.uri.clone())
                .ok_or_else(|| StoreError::other("in-memory database is not running"))?,
        };

        let slot: ConnectionSlot = Arc::new(Mutex::new(Some(self.open_connection(&target)?)));
        lifecycle.sessions.retain(|weak| weak.strong_count() > 0);
        lifecycle.sessions.push(Arc::downgrade(&slot));

        Ok(SqliteSession {
            slot,
            state: Arc::clone(&self.state),
            epoch: self.state.epoch.load(Ordering::SeqCst),
            autocommit: self.options.autocommit,
            persistent: matches!(self.location, Location::File(_)),
        })
    }

    fn options(&self) -> SessionOptions {
        self.options
    }
}

/// Session of a [`SqliteStore`]
pub struct SqliteSession {
    slot: ConnectionSlot,
    state: Arc<StoreState>,
    epoch: u64,
    autocommit: bool,
    persistent: bool,
}

impl SqliteSession {
    /// True while a transaction is open on this session
    pub fn in_transaction(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .map(|conn| !conn.is_autocommit())
            .unwrap_or(false)
    }

    /// Run `f` on the connection of a session that is still valid.
    ///
    /// A session outlived by a shutdown has already lost its connection (the
    /// shutdown dropped it, rolling back its open transaction).
    fn with_live<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut slot = self.slot.lock();
        if self.state.epoch.load(Ordering::SeqCst) != self.epoch {
            slot.take();
            return Err(StoreError::connection_closed("store was shut down"));
        }
        match slot.as_ref() {
            Some(conn) => f(conn),
            None => Err(StoreError::connection_closed("session is closed")),
        }
    }

    /// Like [`with_live`](Self::with_live), with a transaction begun first if
    /// autocommit is off
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let autocommit = self.autocommit;
        self.with_live(|conn| {
            if !autocommit && conn.is_autocommit() {
                conn.execute_batch("BEGIN").map_err(map_error)?;
            }
            f(conn)
        })
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(sql).map_err(map_error)?;
            stmt.execute(params_from_iter(params)).map_err(map_error)
        })
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(sql).map_err(map_error)?;
            let columns = stmt.column_count();
            let mut rows = stmt.query(params_from_iter(params)).map_err(map_error)?;

            let mut result = Vec::new();
            while let Some(row) = rows.next().map_err(map_error)? {
                let values = (0..columns)
                    .map(|i| row.get_ref(i).map(SqlValue::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_error)?;
                result.push(Row::new(values));
            }
            Ok(result)
        })
    }

    fn upsert(&mut self, table: &str, values: &[SqlValue]) -> StoreResult<()> {
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT OR REPLACE INTO {} VALUES ({})", table, placeholders);
        self.execute(&sql, values)?;
        Ok(())
    }

    fn set_autocommit(&mut self, autocommit: bool) -> StoreResult<()> {
        if autocommit && !self.autocommit {
            self.commit()?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.with_live(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT").map_err(map_error)?;
            }
            Ok(())
        })
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.with_live(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK").map_err(map_error)?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        // Lock order is lifecycle, then session slots; sessions never take the
        // lifecycle lock while holding their own slot.
        let mut lifecycle = self.state.lifecycle.lock();
        let mut own = self.slot.lock();
        if self.state.epoch.load(Ordering::SeqCst) != self.epoch {
            // Another session won the race to shut down.
            own.take();
            return Err(StoreError::connection_closed("store was shut down"));
        }
        if own.is_none() {
            return Err(StoreError::connection_closed("session is closed"));
        }
        self.state.epoch.fetch_add(1, Ordering::SeqCst);

        // Dropping a connection rolls back its open transaction and releases
        // its locks, so the restarted store starts with no writer.
        let mut closed = 0usize;
        for weak in lifecycle.sessions.drain(..) {
            let Some(slot) = weak.upgrade() else { continue };
            if Arc::ptr_eq(&slot, &self.slot) {
                continue;
            }
            if slot.lock().take().is_some() {
                closed += 1;
            }
        }

        if self.persistent {
            if let Some(conn) = own.as_ref() {
                if let Err(e) = conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(())) {
                    warn!(target: "stress::store", error = %e, "Checkpoint before shutdown failed");
                }
            }
        }
        own.take();
        lifecycle.running = false;
        lifecycle.memory = None;
        info!(
            target: "stress::store",
            epoch = self.epoch + 1,
            closed_sessions = closed,
            "Store shut down"
        );
        Ok(())
    }

    fn close(self) -> StoreResult<()> {
        let conn = {
            let mut slot = self.slot.lock();
            if self.state.epoch.load(Ordering::SeqCst) != self.epoch {
                slot.take();
                return Err(StoreError::connection_closed("store was shut down"));
            }
            slot.take()
        };
        match conn {
            Some(conn) => {
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK").map_err(map_error)?;
                }
                conn.close().map_err(|(_, e)| map_error(e))
            }
            None => Err(StoreError::connection_closed("session is closed")),
        }
    }
}

/// Classify a rusqlite error
fn map_error(err: rusqlite::Error) -> StoreError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreErrorKind::LockTimeout,
            ErrorCode::ConstraintViolation => StoreErrorKind::ConstraintViolation,
            ErrorCode::SystemIoFailure | ErrorCode::CannotOpen | ErrorCode::DiskFull => {
                StoreErrorKind::Io
            }
            _ => StoreErrorKind::Other,
        },
        _ => StoreErrorKind::Other,
    };
    StoreError::new(kind, err.to_string())
}
