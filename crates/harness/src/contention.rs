//! Contention scenario
//!
//! `threads` workers, each with its own session, hammer a table of
//! `row_count` keys with a seeded random mix of upserts, updates, deletes and
//! point queries for a fixed wall-clock duration. Then the scenario requests
//! stop, joins every worker and renders a verdict: it passes iff no worker
//! reported a failure and the key space is still well-formed.
//!
//! The tiny key domain and high concurrency are meant to provoke lock waits,
//! write-write conflicts and phantom rows in the store; this is a fuzzer for
//! its concurrency control, not a throughput benchmark.

use crate::policy::ErrorPolicy;
use crate::task::{StopSignal, Task};
use crate::workload::WorkloadGenerator;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stress_core::{
    HarnessConfig, HarnessError, HarnessResult, Operation, StoreError, Verdict, WorkerError,
};
use stress_store::{Session, SqlValue, Store};
use tracing::{error, info, warn};

/// Table the workers contend on
pub const CONTENTION_TABLE: &str = "test";

/// Scenario name used in verdicts and logs
pub const CONTENTION_SCENARIO: &str = "contention";

/// Contention scenario parameters
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// Number of workers
    pub threads: usize,
    /// Key domain size
    pub row_count: u32,
    /// How long the workers run before stop is requested
    pub duration: Duration,
    /// Worker `i` is seeded with `seed_base + i`
    pub seed_base: u64,
    /// Store errors a worker may absorb
    pub policy: ErrorPolicy,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self::from_harness(&HarnessConfig::default())
    }
}

impl ContentionConfig {
    /// Take the contention parameters of a harness config
    pub fn from_harness(config: &HarnessConfig) -> Self {
        ContentionConfig {
            threads: config.threads,
            row_count: config.row_count,
            duration: config.duration(),
            seed_base: config.seed_base,
            policy: ErrorPolicy::tolerating(config.acceptable_errors.iter().copied()),
        }
    }
}

/// Outcome of a contention run
#[derive(Debug, Clone, Serialize)]
pub struct ContentionReport {
    /// Pass/fail with every recorded failure
    pub verdict: Verdict,
    /// Operations that completed successfully
    pub operations: u64,
    /// Store errors absorbed under the policy
    pub tolerated: u64,
    /// Time from launch until every worker was joined
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    operations: AtomicU64,
    tolerated: AtomicU64,
}

/// Statements a worker issues, built once per worker
struct WorkloadStatements {
    table: String,
    update: String,
    delete: String,
    select: String,
}

impl WorkloadStatements {
    fn for_table(table: &str) -> Self {
        WorkloadStatements {
            table: table.to_string(),
            update: format!("UPDATE {} SET name = ?1 WHERE id = ?2", table),
            delete: format!("DELETE FROM {} WHERE id = ?1", table),
            select: format!("SELECT id, name FROM {} WHERE id = ?1", table),
        }
    }
}

/// Execute one workload operation against `table` (`id` primary key, `name`
/// value column). Inserts are upserts, so concurrent inserts of one key never
/// collide.
///
/// # Errors
///
/// - [`WorkerError::Store`] tagged with the operation if the store failed
/// - [`WorkerError::Assertion`] if a point query returned more than one row
///   or a row for another key
pub fn apply_operation<S: Session + ?Sized>(
    session: &mut S,
    table: &str,
    operation: &Operation,
) -> Result<(), WorkerError> {
    apply_with(session, &WorkloadStatements::for_table(table), operation)
}

fn apply_with<S: Session + ?Sized>(
    session: &mut S,
    statements: &WorkloadStatements,
    operation: &Operation,
) -> Result<(), WorkerError> {
    let failed = |e: StoreError| WorkerError::store(operation, e);
    match operation {
        Operation::Insert { key, value } => session
            .upsert(
                &statements.table,
                &[SqlValue::Integer(*key), SqlValue::from(value.as_str())],
            )
            .map_err(failed),
        Operation::Update { key, value } => session
            .execute(
                &statements.update,
                &[SqlValue::from(value.as_str()), SqlValue::Integer(*key)],
            )
            .map(|_| ())
            .map_err(failed),
        Operation::Delete { key } => session
            .execute(&statements.delete, &[SqlValue::Integer(*key)])
            .map(|_| ())
            .map_err(failed),
        Operation::PointQuery { key } => {
            let rows = session
                .query(&statements.select, &[SqlValue::Integer(*key)])
                .map_err(failed)?;
            if rows.len() > 1 {
                return Err(WorkerError::Assertion(format!(
                    "{} returned {} rows",
                    operation,
                    rows.len()
                )));
            }
            for row in &rows {
                let id = row.get_i64(0).map_err(failed)?;
                if id != *key {
                    return Err(WorkerError::Assertion(format!(
                        "{} returned the row of key {}",
                        operation, id
                    )));
                }
                row.get_text(1).map_err(failed)?;
            }
            Ok(())
        }
    }
}

/// N workers racing on a small shared key space
#[derive(Debug, Clone, Default)]
pub struct ContentionScenario {
    config: ContentionConfig,
}

impl ContentionScenario {
    /// Scenario with the given parameters
    pub fn new(config: ContentionConfig) -> Self {
        ContentionScenario { config }
    }

    /// Parameters of this scenario
    pub fn config(&self) -> &ContentionConfig {
        &self.config
    }

    /// Run the scenario against `store`.
    ///
    /// Worker failures end up in the verdict; `Err` is reserved for the
    /// harness itself failing (setup, spawn, verification I/O).
    pub fn run<S>(&self, store: &Arc<S>) -> HarnessResult<ContentionReport>
    where
        S: Store + 'static,
    {
        let config = &self.config;
        info!(
            target: "stress::contention",
            threads = config.threads,
            row_count = config.row_count,
            duration_ms = config.duration.as_millis() as u64,
            strict = config.policy.is_strict(),
            "Starting contention scenario"
        );
        create_table(store.as_ref())?;

        let started = Instant::now();
        let stop = StopSignal::new();
        let counters = Arc::new(Counters::default());
        let mut tasks = Vec::with_capacity(config.threads);

        for worker in 0..config.threads {
            let mut task = Task::with_stop(format!("worker-{}", worker), stop.clone());
            let store = Arc::clone(store);
            let counters = Arc::clone(&counters);
            let policy = config.policy.clone();
            let workload = WorkloadGenerator::for_worker(config.seed_base, worker, config.row_count);

            let launched = task.launch(move |stop| {
                run_worker(store.as_ref(), workload, &policy, &stop, &counters)
            });
            if let Err(e) = launched {
                stop.request();
                crate::task::join_all(&mut tasks)?;
                return Err(e);
            }
            tasks.push(task);
        }

        thread::sleep(config.duration);
        for task in tasks.iter_mut() {
            task.request_stop();
        }

        let mut verdict = Verdict::new(CONTENTION_SCENARIO);
        for (worker, failure) in crate::task::join_all(&mut tasks)? {
            error!(
                target: "stress::contention",
                worker = %worker,
                operation = failure.operation().unwrap_or("-"),
                kind = failure.kind_label(),
                error = %failure,
                "Worker failed"
            );
            verdict.record(worker, &failure);
        }
        let elapsed = started.elapsed();

        verify_key_space(store.as_ref(), config.row_count, &mut verdict)?;

        let report = ContentionReport {
            verdict,
            operations: counters.operations.load(Ordering::Relaxed),
            tolerated: counters.tolerated.load(Ordering::Relaxed),
            elapsed,
        };
        info!(
            target: "stress::contention",
            success = report.verdict.is_success(),
            failures = report.verdict.failures.len(),
            operations = report.operations,
            tolerated = report.tolerated,
            elapsed_ms = elapsed.as_millis() as u64,
            "Contention scenario finished"
        );
        Ok(report)
    }
}

fn run_worker<S: Store>(
    store: &S,
    mut workload: WorkloadGenerator,
    policy: &ErrorPolicy,
    stop: &StopSignal,
    counters: &Counters,
) -> Result<(), WorkerError> {
    let statements = WorkloadStatements::for_table(CONTENTION_TABLE);
    let mut session = store
        .open_session()
        .map_err(|e| WorkerError::store("open session", e))?;

    while !stop.is_requested() {
        let operation = workload.next_operation();
        match apply_with(&mut session, &statements, &operation) {
            Ok(()) => {
                counters.operations.fetch_add(1, Ordering::Relaxed);
            }
            Err(WorkerError::Store { source, .. }) if policy.accepts(&source) => {
                counters.tolerated.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "stress::contention",
                    seed = workload.seed(),
                    operation = %operation,
                    error = %source,
                    "Tolerated store error"
                );
            }
            Err(e) => return Err(e),
        }
    }

    session
        .close()
        .map_err(|e| WorkerError::store("close session", e))
}

fn create_table<S: Store>(store: &S) -> HarnessResult<()> {
    let mut session = store.open_session()?;
    session.execute(&format!("DROP TABLE IF EXISTS {}", CONTENTION_TABLE), &[])?;
    session.execute(
        &format!(
            "CREATE TABLE {}(id INTEGER PRIMARY KEY, name VARCHAR)",
            CONTENTION_TABLE
        ),
        &[],
    )?;
    session.close()?;
    Ok(())
}

/// Every surviving key must be inside the domain and appear exactly once.
fn verify_key_space<S: Store>(
    store: &S,
    row_count: u32,
    verdict: &mut Verdict,
) -> HarnessResult<()> {
    let mut session = store.open_session()?;
    let rows = session.query(
        &format!(
            "SELECT id, COUNT(*) FROM {} GROUP BY id ORDER BY id",
            CONTENTION_TABLE
        ),
        &[],
    )?;
    session.close()?;

    for row in rows {
        let id = row.get_i64(0).map_err(HarnessError::from)?;
        let copies = row.get_i64(1).map_err(HarnessError::from)?;
        if id < 0 || id >= i64::from(row_count) || copies != 1 {
            let failure = WorkerError::Assertion(format!(
                "key {} appears {} time(s); expected once within [0, {})",
                id, copies, row_count
            ));
            error!(target: "stress::contention", error = %failure, "Key space check failed");
            verdict.record("verifier", &failure);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stress_core::{SessionOptions, StorageMode, StoreResult};
    use stress_store::{Row, SqliteStore};
    use tempfile::TempDir;

    /// Session that answers every query with the same rows
    struct CannedSession {
        rows: Vec<Row>,
    }

    impl Session for CannedSession {
        fn execute(&mut self, _sql: &str, _params: &[SqlValue]) -> StoreResult<usize> {
            Ok(0)
        }

        fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> StoreResult<Vec<Row>> {
            Ok(self.rows.clone())
        }

        fn upsert(&mut self, _table: &str, _values: &[SqlValue]) -> StoreResult<()> {
            Err(StoreError::other("read-only"))
        }

        fn set_autocommit(&mut self, _autocommit: bool) -> StoreResult<()> {
            Ok(())
        }

        fn commit(&mut self) -> StoreResult<()> {
            Ok(())
        }

        fn rollback(&mut self) -> StoreResult<()> {
            Ok(())
        }

        fn shutdown(&mut self) -> StoreResult<()> {
            Ok(())
        }

        fn close(self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn row(id: i64, name: &str) -> Row {
        Row::new(vec![SqlValue::Integer(id), SqlValue::from(name)])
    }

    fn short_config(threads: usize) -> ContentionConfig {
        ContentionConfig {
            threads,
            duration: Duration::from_millis(150),
            ..ContentionConfig::default()
        }
    }

    #[test]
    fn test_default_config_matches_harness_defaults() {
        let config = ContentionConfig::default();
        assert_eq!(config.threads, 10);
        assert_eq!(config.row_count, 3);
        assert_eq!(config.duration, Duration::from_millis(2000));
        assert!(config.policy.is_strict());
    }

    #[test]
    fn test_apply_operation_sequence() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::persistent(dir.path(), SessionOptions::default()).unwrap();
        create_table(&store).unwrap();
        let mut session = store.open_session().unwrap();

        let ops = [
            Operation::Insert {
                key: 0,
                value: "x1".into(),
            },
            Operation::Insert {
                key: 0,
                value: "x2".into(),
            },
            Operation::Update {
                key: 0,
                value: "x0".into(),
            },
            Operation::Update {
                key: 2,
                value: "x0".into(),
            },
            Operation::PointQuery { key: 0 },
            Operation::Delete { key: 1 },
        ];
        for op in &ops {
            apply_operation(&mut session, CONTENTION_TABLE, op).unwrap();
        }

        let rows = session.query("SELECT id, name FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64(0).unwrap(), 0);
        assert_eq!(rows[0].get_text(1).unwrap(), Some("x0"));
    }

    #[test]
    fn test_point_query_accepts_missing_or_matching_row() {
        let query = Operation::PointQuery { key: 1 };
        let mut empty = CannedSession { rows: vec![] };
        apply_operation(&mut empty, CONTENTION_TABLE, &query).unwrap();
        let mut matching = CannedSession {
            rows: vec![row(1, "x2")],
        };
        apply_operation(&mut matching, CONTENTION_TABLE, &query).unwrap();
    }

    #[test]
    fn test_point_query_rejects_duplicate_rows() {
        let mut session = CannedSession {
            rows: vec![row(1, "x0"), row(1, "x1")],
        };
        let err = apply_operation(&mut session, CONTENTION_TABLE, &Operation::PointQuery { key: 1 })
            .unwrap_err();
        match err {
            WorkerError::Assertion(msg) => assert!(msg.contains("returned 2 rows"), "{}", msg),
            other => panic!("expected assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_point_query_rejects_foreign_key_row() {
        let mut session = CannedSession {
            rows: vec![row(2, "x0")],
        };
        let err = apply_operation(&mut session, CONTENTION_TABLE, &Operation::PointQuery { key: 0 })
            .unwrap_err();
        assert_eq!(err.kind_label(), "assertion");
        assert!(err.to_string().contains("point_query(0)"));
    }

    #[test]
    fn test_store_error_is_tagged_with_operation() {
        let mut session = CannedSession { rows: vec![] };
        let insert = Operation::Insert {
            key: 2,
            value: "x1".into(),
        };
        let err = apply_operation(&mut session, CONTENTION_TABLE, &insert).unwrap_err();
        assert_eq!(err.operation(), Some("insert(2, x1)"));
        assert_eq!(err.store_kind(), Some(stress_core::StoreErrorKind::Other));
    }

    #[test]
    fn test_single_worker_run_passes() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::persistent(dir.path(), SessionOptions::default()).unwrap());
        let report = ContentionScenario::new(short_config(1)).run(&store).unwrap();
        assert!(report.verdict.is_success(), "{:?}", report.verdict);
        assert!(report.operations > 0);
        assert_eq!(report.tolerated, 0);
    }

    #[test]
    fn test_memory_mode_run_passes() {
        let options = SessionOptions {
            storage_mode: StorageMode::Memory,
            ..SessionOptions::default()
        };
        let store = Arc::new(SqliteStore::in_memory(options).unwrap());
        let report = ContentionScenario::new(short_config(4)).run(&store).unwrap();
        assert!(report.verdict.is_success(), "{:?}", report.verdict);
    }
}
