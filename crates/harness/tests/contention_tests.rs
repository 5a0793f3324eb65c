//! Contention scenario integration tests
//!
//! Runs real workers against the bundled SQLite store and against a fault
//! injecting wrapper, checking verdicts, termination and key-space integrity.
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test -p stress-harness --test contention_tests
//! cargo test -p stress-harness --test contention_tests -- --ignored   # soak
//! ```

mod common;

use common::{memory_store, persistent_store, FaultTarget, FaultyStore};
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use stress_core::{HarnessConfig, Operation, SessionOptions, StoreErrorKind};
use stress_harness::{
    apply_operation, run_passes, ContentionConfig, ContentionScenario, ErrorPolicy,
    ScenarioSelection, CONTENTION_TABLE,
};
use stress_store::{Session, SqliteStore, Store};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn config(threads: usize, duration_ms: u64) -> ContentionConfig {
    ContentionConfig {
        threads,
        duration: Duration::from_millis(duration_ms),
        ..ContentionConfig::default()
    }
}

/// Count rows per id in the contention table
fn rows_per_key<S: Store>(store: &S) -> HashMap<i64, usize> {
    let mut session = store.open_session().unwrap();
    let rows = session
        .query(&format!("SELECT id FROM {}", CONTENTION_TABLE), &[])
        .unwrap();
    session.close().unwrap();

    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row.get_i64(0).unwrap()).or_insert(0) += 1;
    }
    counts
}

fn faulty_store(target: FaultTarget, kind: StoreErrorKind) -> (Arc<FaultyStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let inner = SqliteStore::persistent(dir.path(), SessionOptions::default()).unwrap();
    (Arc::new(FaultyStore::new(inner, target, "DELETE", kind)), dir)
}

// ============================================================================
// Verdicts
// ============================================================================

/// Ten workers, three keys, two seconds, two second lock timeout.
#[test]
fn test_default_contention_run_has_no_failures() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let scenario = ContentionScenario::new(ContentionConfig::default());
    assert_eq!(scenario.config().threads, 10);
    assert_eq!(scenario.config().row_count, 3);

    let report = scenario.run(&store).unwrap();
    assert!(report.verdict.is_success(), "{:#?}", report.verdict);
    assert!(report.operations > 0);
    assert_eq!(report.tolerated, 0);
}

#[test]
fn test_memory_store_contention_passes() {
    let store = memory_store();
    let report = ContentionScenario::new(config(8, 300)).run(&store).unwrap();
    assert!(report.verdict.is_success(), "{:#?}", report.verdict);
    assert!(report.operations > 0);
}

#[test]
fn test_run_terminates_within_duration_plus_lock_timeout() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let duration = Duration::from_millis(300);
    let report = ContentionScenario::new(config(10, 300)).run(&store).unwrap();

    assert!(report.elapsed >= duration);
    let bound = duration + SessionOptions::default().lock_timeout + Duration::from_secs(5);
    assert!(
        report.elapsed < bound,
        "took {:?}, bound {:?}",
        report.elapsed,
        bound
    );
}

#[test]
fn test_concurrent_upserts_leave_one_row_per_key() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let report = ContentionScenario::new(config(10, 400)).run(&store).unwrap();
    assert!(report.verdict.is_success(), "{:#?}", report.verdict);

    for (key, copies) in rows_per_key(store.as_ref()) {
        assert!((0..3).contains(&key), "key {} outside the domain", key);
        assert_eq!(copies, 1, "key {} stored {} times", key, copies);
    }
}

#[test]
fn test_identical_concurrent_inserts_are_idempotent() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let mut setup = store.open_session().unwrap();
    setup
        .execute(
            &format!(
                "CREATE TABLE {}(id INTEGER PRIMARY KEY, name VARCHAR)",
                CONTENTION_TABLE
            ),
            &[],
        )
        .unwrap();
    setup.close().unwrap();

    let start = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let insert = Operation::Insert {
                    key: 1,
                    value: "x2".to_string(),
                };
                let mut session = store.open_session().unwrap();
                start.wait();
                for _ in 0..200 {
                    apply_operation(&mut session, CONTENTION_TABLE, &insert).unwrap();
                }
                session.close().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut session = store.open_session().unwrap();
    let rows = session
        .query(&format!("SELECT id, name FROM {}", CONTENTION_TABLE), &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64(0).unwrap(), 1);
    assert_eq!(rows[0].get_text(1).unwrap(), Some("x2"));
}

#[test]
fn test_larger_key_space_stays_in_domain() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let scenario = ContentionScenario::new(ContentionConfig {
        row_count: 50,
        ..config(4, 200)
    });
    let report = scenario.run(&store).unwrap();
    assert!(report.verdict.is_success(), "{:#?}", report.verdict);
    assert!(rows_per_key(store.as_ref()).keys().all(|k| (0..50).contains(k)));
}

// ============================================================================
// Failure capture
// ============================================================================

#[test]
fn test_failing_worker_is_recorded_and_siblings_complete() {
    // Session 0 creates the table; session 1 belongs to the first worker to open one.
    let (store, _dir) = faulty_store(FaultTarget::Session(1), StoreErrorKind::Deadlock);
    let report = ContentionScenario::new(config(4, 300)).run(&store).unwrap();

    assert!(!report.verdict.is_success());
    assert_eq!(report.verdict.failures.len(), 1, "{:#?}", report.verdict);
    let failure = &report.verdict.failures[0];
    assert!(failure.worker.starts_with("worker-"));
    assert_eq!(failure.kind, "deadlock");
    assert!(failure
        .operation
        .as_deref()
        .is_some_and(|op| op.starts_with("delete(")));
    assert!(report.operations > 0);
    // table setup + 4 workers + verifier
    assert_eq!(store.sessions_opened(), 6);
}

#[test]
fn test_strict_policy_fails_every_worker_on_error() {
    let (store, _dir) = faulty_store(FaultTarget::All, StoreErrorKind::LockTimeout);
    let report = ContentionScenario::new(config(3, 200)).run(&store).unwrap();

    assert_eq!(report.verdict.failures.len(), 3);
    assert!(report.verdict.failures.iter().all(|f| f.kind == "lock_timeout"));
    assert!(report.verdict.ensure_success().is_err());
}

#[test]
fn test_whitelisted_errors_are_tolerated() {
    let (store, _dir) = faulty_store(FaultTarget::All, StoreErrorKind::LockTimeout);
    let scenario = ContentionScenario::new(ContentionConfig {
        policy: ErrorPolicy::tolerating([StoreErrorKind::LockTimeout]),
        ..config(3, 200)
    });
    let report = scenario.run(&store).unwrap();

    assert!(report.verdict.is_success(), "{:#?}", report.verdict);
    assert!(report.tolerated > 0);
    assert!(report.operations > 0);
}

#[test]
fn test_whitelist_does_not_cover_other_kinds() {
    let (store, _dir) = faulty_store(FaultTarget::Session(1), StoreErrorKind::Io);
    let scenario = ContentionScenario::new(ContentionConfig {
        policy: ErrorPolicy::tolerating([StoreErrorKind::LockTimeout]),
        ..config(2, 200)
    });
    let report = scenario.run(&store).unwrap();
    assert_eq!(report.verdict.failures.len(), 1);
    assert_eq!(report.verdict.failures[0].kind, "io");
}

// ============================================================================
// Soak
// ============================================================================

#[test]
#[ignore]
fn soak_contention_many_passes() {
    let (store, _dir) = persistent_store(SessionOptions::default());
    let config = HarnessConfig {
        passes: 20,
        ..HarnessConfig::default()
    };
    let summary = run_passes(&store, &config, ScenarioSelection::Contention).unwrap();
    assert!(summary.is_success(), "{:#?}", summary.failures());
    assert_eq!(summary.passes.len(), 20);
}
