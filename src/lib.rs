//! Strata stress - concurrency-correctness harness for transactional stores
//!
//! Drives many workers issuing randomized, overlapping reads, writes and
//! deletes against a deliberately tiny key space, and races uncommitted
//! transactions against administrative shutdowns. Every run ends in a
//! verdict: pass iff no worker hit an unexpected failure.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_stress::{run_passes, HarnessConfig, ScenarioSelection, SqliteStore};
//!
//! let config = HarnessConfig::default();
//! let store = Arc::new(SqliteStore::persistent("/tmp/stress", config.session_options())?);
//! let summary = run_passes(&store, &config, ScenarioSelection::All)?;
//! summary.ensure_success()?;
//! ```
//!
//! # Architecture
//!
//! - `stress-core`: errors, configuration, operations, verdicts
//! - `stress-store`: the `Store` / `Session` capability surface and the
//!   bundled SQLite backend
//! - `stress-harness`: tasks, the rendezvous latch, the workload generator
//!   and the scenarios

pub use stress_core::*;
pub use stress_harness::*;
pub use stress_store::{Row, Session, SqlValue, SqliteSession, SqliteStore, Store};
