//! Concurrency harness for the Strata stress suite
//!
//! This crate drives concurrent workers against a [`stress_store::Store`]:
//! - Task / StopSignal: joinable, failure-capturing threads with cooperative stop
//! - RendezvousLatch: countdown barrier with idempotent per-participant arrival
//! - WorkloadGenerator: seeded random operation stream over a small key space
//! - ContentionScenario: N workers racing on the same keys for a fixed duration
//! - ShutdownScenario: an uncommitted writer racing administrative shutdowns
//! - Runner: multi-pass execution that stops at the first failing pass
//!
//! Worker failures never escape their Task; every scenario collects them into
//! a [`stress_core::Verdict`] after all of its Tasks are joined.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contention;
pub mod latch;
pub mod policy;
pub mod runner;
pub mod shutdown;
pub mod task;
pub mod trace;
pub mod workload;

pub use contention::{
    apply_operation, ContentionConfig, ContentionReport, ContentionScenario, CONTENTION_SCENARIO,
    CONTENTION_TABLE,
};
pub use latch::{Arrival, RendezvousLatch};
pub use policy::ErrorPolicy;
pub use runner::{pass_seed, run_passes, PassOutcome, RunSummary, ScenarioSelection};
pub use shutdown::{ShutdownReport, ShutdownScenario, SHUTDOWN_SCENARIO, SHUTDOWN_TABLE};
pub use task::{join_all, StopSignal, Task, TaskState};
pub use trace::{check_rendezvous, ScenarioTrace, TraceEvent};
pub use workload::{generate, WorkloadGenerator};
