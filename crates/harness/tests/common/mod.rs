//! Shared helpers for the harness integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stress_core::{SessionOptions, StorageMode, StoreError, StoreErrorKind, StoreResult};
use stress_store::{Row, Session, SqlValue, SqliteSession, SqliteStore, Store};
use tempfile::TempDir;

/// Persistent store in a fresh temp dir; keep the dir alive for the test.
pub fn persistent_store(options: SessionOptions) -> (Arc<SqliteStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::persistent(dir.path(), options).unwrap();
    (Arc::new(store), dir)
}

pub fn memory_store() -> Arc<SqliteStore> {
    let options = SessionOptions {
        storage_mode: StorageMode::Memory,
        ..SessionOptions::default()
    };
    Arc::new(SqliteStore::in_memory(options).unwrap())
}

/// Which sessions get a fault injected
#[derive(Debug, Clone, Copy)]
pub enum FaultTarget {
    /// Only the n-th session opened (0-based)
    Session(usize),
    /// Every session
    All,
}

/// Wraps a SQLite store and fails statements starting with `prefix`
pub struct FaultyStore {
    inner: SqliteStore,
    target: FaultTarget,
    prefix: &'static str,
    kind: StoreErrorKind,
    opened: AtomicUsize,
}

impl FaultyStore {
    pub fn new(
        inner: SqliteStore,
        target: FaultTarget,
        prefix: &'static str,
        kind: StoreErrorKind,
    ) -> Self {
        FaultyStore {
            inner,
            target,
            prefix,
            kind,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Store for FaultyStore {
    type Session = FaultySession;

    fn open_session(&self) -> StoreResult<FaultySession> {
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        let faulty = match self.target {
            FaultTarget::Session(n) => n == index,
            FaultTarget::All => true,
        };
        Ok(FaultySession {
            inner: self.inner.open_session()?,
            fault: faulty.then_some((self.prefix, self.kind)),
        })
    }

    fn options(&self) -> SessionOptions {
        self.inner.options()
    }
}

pub struct FaultySession {
    inner: SqliteSession,
    fault: Option<(&'static str, StoreErrorKind)>,
}

impl FaultySession {
    fn check(&self, sql: &str) -> StoreResult<()> {
        match self.fault {
            Some((prefix, kind)) if sql.starts_with(prefix) => {
                Err(StoreError::new(kind, format!("injected fault on '{}'", sql)))
            }
            _ => Ok(()),
        }
    }
}

impl Session for FaultySession {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        self.check(sql)?;
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        self.check(sql)?;
        self.inner.query(sql, params)
    }

    fn upsert(&mut self, table: &str, values: &[SqlValue]) -> StoreResult<()> {
        self.check("INSERT OR REPLACE")?;
        self.inner.upsert(table, values)
    }

    fn set_autocommit(&mut self, autocommit: bool) -> StoreResult<()> {
        self.inner.set_autocommit(autocommit)
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        self.inner.shutdown()
    }

    fn close(self) -> StoreResult<()> {
        self.inner.close()
    }
}

/// How a [`TamperingStore`] session misbehaves when autocommit is turned off
#[derive(Debug, Clone, Copy)]
pub enum Tamper {
    /// Keep autocommit on, so the "uncommitted" writes are committed at once
    IgnoreAutocommitOff,
    /// Delete the committed row 0 first, then turn autocommit off
    DeleteCommittedRow,
}

/// Wraps a SQLite store whose sessions break durability on purpose
pub struct TamperingStore {
    inner: SqliteStore,
    tamper: Tamper,
}

impl TamperingStore {
    pub fn new(inner: SqliteStore, tamper: Tamper) -> Self {
        TamperingStore { inner, tamper }
    }
}

impl Store for TamperingStore {
    type Session = TamperingSession;

    fn open_session(&self) -> StoreResult<TamperingSession> {
        Ok(TamperingSession {
            inner: self.inner.open_session()?,
            tamper: self.tamper,
        })
    }

    fn options(&self) -> SessionOptions {
        self.inner.options()
    }
}

pub struct TamperingSession {
    inner: SqliteSession,
    tamper: Tamper,
}

impl Session for TamperingSession {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        self.inner.query(sql, params)
    }

    fn upsert(&mut self, table: &str, values: &[SqlValue]) -> StoreResult<()> {
        self.inner.upsert(table, values)
    }

    fn set_autocommit(&mut self, autocommit: bool) -> StoreResult<()> {
        if autocommit {
            return self.inner.set_autocommit(true);
        }
        match self.tamper {
            Tamper::IgnoreAutocommitOff => Ok(()),
            Tamper::DeleteCommittedRow => {
                self.inner.execute("DELETE FROM test WHERE id = 0", &[])?;
                self.inner.set_autocommit(false)
            }
        }
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        self.inner.shutdown()
    }

    fn close(self) -> StoreResult<()> {
        self.inner.close()
    }
}
