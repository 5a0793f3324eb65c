//! Barrier-synchronized shutdown scenario
//!
//! Races a live, uncommitted transaction against administrative shutdowns:
//!
//! 1. Create `test` with one committed row (id 0).
//! 2. The writer disables autocommit, inserts id 1 and never commits.
//! 3. `issuers` sessions open alongside it.
//! 4. Everyone meets at a [`RendezvousLatch`]; only then do the issuers call
//!    shutdown while the writer closes its session.
//! 5. After every task is joined, a fresh session (restarting the store)
//!    must see exactly the committed row.
//!
//! Sessions closed underneath their owner by the shutdown are the expected
//! outcome of the race and are reported as tolerated, not as failures.
//! In memory mode the scenario is skipped: nothing survives a restart there.

use crate::latch::RendezvousLatch;
use crate::policy::ErrorPolicy;
use crate::task::{join_all, Task};
use crate::trace::{check_rendezvous, ScenarioTrace, TraceEvent};
use serde::Serialize;
use std::sync::Arc;
use stress_core::{
    Failure, HarnessConfig, HarnessResult, StorageMode, Verdict, WorkerError,
};
use stress_store::{Session, SqlValue, Store};
use tracing::{error, info, warn};

/// Table the scenario writes to
pub const SHUTDOWN_TABLE: &str = "test";

/// Scenario name used in verdicts and logs
pub const SHUTDOWN_SCENARIO: &str = "shutdown";

/// Latch index of the writer; issuers are `1..=issuers`
pub const WRITER_PARTICIPANT: usize = 0;

/// Outcome of a shutdown run
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Pass/fail with every recorded failure
    pub verdict: Verdict,
    /// True when the store has no restart durability to test
    pub skipped: bool,
    /// Ids found after the restart
    pub surviving_ids: Vec<i64>,
    /// Benign race outcomes (sessions closed by the shutdown)
    pub tolerated: Vec<Failure>,
    /// Rendezvous and shutdown events in the order they happened
    pub trace: Vec<TraceEvent>,
}

impl ShutdownReport {
    fn skipped() -> Self {
        ShutdownReport {
            verdict: Verdict::new(SHUTDOWN_SCENARIO),
            skipped: true,
            surviving_ids: Vec::new(),
            tolerated: Vec::new(),
            trace: Vec::new(),
        }
    }
}

/// Writer vs. shutdown issuers, synchronized by a latch
#[derive(Debug, Clone)]
pub struct ShutdownScenario {
    issuers: usize,
    policy: ErrorPolicy,
}

impl Default for ShutdownScenario {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ShutdownScenario {
    /// Scenario with `issuers` shutdown issuers (at least one)
    pub fn new(issuers: usize) -> Self {
        ShutdownScenario {
            issuers: issuers.max(1),
            policy: ErrorPolicy::shutdown_race(),
        }
    }

    /// Take the shutdown parameters of a harness config
    pub fn from_harness(config: &HarnessConfig) -> Self {
        Self::new(config.shutdown_issuers)
    }

    /// Number of shutdown issuers
    pub fn issuers(&self) -> usize {
        self.issuers
    }

    /// Latch capacity: the writer plus every issuer
    pub fn parties(&self) -> usize {
        self.issuers + 1
    }

    /// Run the scenario against `store`
    pub fn run<S>(&self, store: &Arc<S>) -> HarnessResult<ShutdownReport>
    where
        S: Store + 'static,
    {
        if store.storage_mode() == StorageMode::Memory {
            info!(
                target: "stress::shutdown",
                "Skipping shutdown scenario: in-memory store has no restart durability"
            );
            return Ok(ShutdownReport::skipped());
        }
        info!(target: "stress::shutdown", issuers = self.issuers, "Starting shutdown scenario");
        seed_table(store.as_ref())?;

        let trace = ScenarioTrace::new();
        let latch = Arc::new(RendezvousLatch::with_trace(self.parties(), trace.clone()));
        let mut tasks = Vec::with_capacity(self.parties());

        for participant in 0..self.parties() {
            let (task, launched) = if participant == WRITER_PARTICIPANT {
                let mut task = Task::new("writer");
                let store = Arc::clone(store);
                let latch = Arc::clone(&latch);
                let launched = task.launch(move |_| run_writer(store.as_ref(), &latch));
                (task, launched)
            } else {
                let mut task = Task::new(format!("shutdown-{}", participant));
                let store = Arc::clone(store);
                let latch = Arc::clone(&latch);
                let trace = trace.clone();
                let launched = task.launch(move |_| {
                    run_issuer(store.as_ref(), &latch, &trace, participant)
                });
                (task, launched)
            };
            if let Err(e) = launched {
                // Release everyone already waiting on participants that will never run.
                for missing in participant..self.parties() {
                    latch.count_down(missing);
                }
                join_all(&mut tasks)?;
                return Err(e);
            }
            tasks.push(task);
        }

        let mut verdict = Verdict::new(SHUTDOWN_SCENARIO);
        let mut tolerated = Vec::new();
        for (worker, failure) in join_all(&mut tasks)? {
            if self.policy.accepts_failure(&failure) {
                info!(
                    target: "stress::shutdown",
                    worker = %worker,
                    error = %failure,
                    "Session closed by shutdown"
                );
                tolerated.push(Failure::from_worker(worker, &failure));
            } else {
                error!(
                    target: "stress::shutdown",
                    worker = %worker,
                    operation = failure.operation().unwrap_or("-"),
                    kind = failure.kind_label(),
                    error = %failure,
                    "Participant failed"
                );
                verdict.record(worker, &failure);
            }
        }

        let trace = trace.events();
        if let Err(violation) = check_rendezvous(&trace, self.parties()) {
            let failure = WorkerError::Assertion(format!("rendezvous violated: {}", violation));
            error!(target: "stress::shutdown", error = %failure, "Rendezvous check failed");
            verdict.record("verifier", &failure);
        }

        let surviving_ids = read_surviving_ids(store.as_ref())?;
        if surviving_ids != vec![0] {
            let failure = WorkerError::Assertion(format!(
                "expected only the committed row [0] after restart, found {:?}",
                surviving_ids
            ));
            error!(target: "stress::shutdown", error = %failure, "Durability check failed");
            verdict.record("verifier", &failure);
        }

        info!(
            target: "stress::shutdown",
            success = verdict.is_success(),
            failures = verdict.failures.len(),
            tolerated = tolerated.len(),
            surviving_rows = surviving_ids.len(),
            "Shutdown scenario finished"
        );
        Ok(ShutdownReport {
            verdict,
            skipped: false,
            surviving_ids,
            tolerated,
            trace,
        })
    }
}

fn seed_table<S: Store>(store: &S) -> HarnessResult<()> {
    let mut session = store.open_session()?;
    session.execute(&format!("DROP TABLE IF EXISTS {}", SHUTDOWN_TABLE), &[])?;
    session.execute(
        &format!("CREATE TABLE {}(id INTEGER PRIMARY KEY, v INTEGER)", SHUTDOWN_TABLE),
        &[],
    )?;
    session.execute(
        &format!("INSERT INTO {} VALUES (?1, ?2)", SHUTDOWN_TABLE),
        &[SqlValue::Integer(0), SqlValue::Integer(0)],
    )?;
    session.close()?;
    Ok(())
}

/// Insert id 1 without committing, wait for everyone, then close.
fn run_writer<S: Store>(store: &S, latch: &Arc<RendezvousLatch>) -> Result<(), WorkerError> {
    let arrival = latch.arrival(WRITER_PARTICIPANT);
    let mut session = store
        .open_session()
        .map_err(|e| WorkerError::store("open session", e))?;
    session
        .set_autocommit(false)
        .map_err(|e| WorkerError::store("disable autocommit", e))?;
    session
        .execute(
            &format!("INSERT INTO {} VALUES (?1, ?2)", SHUTDOWN_TABLE),
            &[SqlValue::Integer(1), SqlValue::Integer(1)],
        )
        .map_err(|e| WorkerError::store("insert(1, 1)", e))?;

    arrival.arrive_and_wait();
    session
        .close()
        .map_err(|e| WorkerError::store("close session", e))
}

/// Open a session, wait for everyone, then shut the store down.
fn run_issuer<S: Store>(
    store: &S,
    latch: &Arc<RendezvousLatch>,
    trace: &ScenarioTrace,
    participant: usize,
) -> Result<(), WorkerError> {
    let arrival = latch.arrival(participant);
    let mut session = store
        .open_session()
        .map_err(|e| WorkerError::store("open session", e))?;

    arrival.arrive_and_wait();
    trace.record(TraceEvent::ShutdownIssued { participant });
    session
        .shutdown()
        .map_err(|e| WorkerError::store("shutdown", e))
}

fn read_surviving_ids<S: Store>(store: &S) -> HarnessResult<Vec<i64>> {
    let mut session = store.open_session()?;
    let rows = session.query(&format!("SELECT id FROM {} ORDER BY id", SHUTDOWN_TABLE), &[])?;
    session.close()?;
    let ids = rows
        .iter()
        .map(|row| row.get_i64(0))
        .collect::<Result<Vec<_>, _>>()?;
    if ids.len() != 1 {
        warn!(target: "stress::shutdown", rows = ids.len(), "Unexpected row count after restart");
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parties_include_writer() {
        let scenario = ShutdownScenario::default();
        assert_eq!(scenario.issuers(), 2);
        assert_eq!(scenario.parties(), 3);
    }

    #[test]
    fn test_at_least_one_issuer() {
        assert_eq!(ShutdownScenario::new(0).issuers(), 1);
    }

    #[test]
    fn test_from_harness_reads_issuers() {
        let config = HarnessConfig {
            shutdown_issuers: 4,
            ..HarnessConfig::default()
        };
        assert_eq!(ShutdownScenario::from_harness(&config).parties(), 5);
    }
}
