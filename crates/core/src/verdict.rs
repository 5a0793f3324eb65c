//! Scenario verdicts
//!
//! A verdict is only finalized after every Task of the scenario has been
//! joined. It passes iff no failure was recorded.

use crate::error::{HarnessError, HarnessResult, WorkerError};
use serde::{Deserialize, Serialize};

/// One recorded failure, in structured-log form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Name of the worker (or `verifier`) that failed
    pub worker: String,
    /// Operation that triggered the failure, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Stable error kind label
    pub kind: String,
    /// Full error message
    pub message: String,
}

impl Failure {
    /// Build a failure record from a captured worker error
    pub fn from_worker(worker: impl Into<String>, error: &WorkerError) -> Self {
        Failure {
            worker: worker.into(),
            operation: error.operation().map(str::to_string),
            kind: error.kind_label().to_string(),
            message: error.to_string(),
        }
    }
}

/// Aggregate result of a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Scenario name
    pub scenario: String,
    /// Failures in the order they were collected
    pub failures: Vec<Failure>,
}

impl Verdict {
    /// Empty (passing) verdict for a scenario
    pub fn new(scenario: impl Into<String>) -> Self {
        Verdict {
            scenario: scenario.into(),
            failures: Vec::new(),
        }
    }

    /// Record a worker failure
    pub fn record(&mut self, worker: impl Into<String>, error: &WorkerError) {
        self.failures.push(Failure::from_worker(worker, error));
    }

    /// True iff no failure was recorded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn a failing verdict into [`HarnessError::ScenarioFailed`]
    pub fn ensure_success(&self) -> HarnessResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(HarnessError::ScenarioFailed {
                scenario: self.scenario.clone(),
                failures: self.failures.len(),
            })
        }
    }
}
