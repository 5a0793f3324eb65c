//! Task: a joinable, failure-capturing unit of concurrent work
//!
//! A Task runs its work on a dedicated OS thread (the work performs blocking
//! store I/O). Whatever the work returns, or a panic it raises, is captured
//! and surfaced only through [`Task::join`] / [`Task::failure`]; it never
//! reaches the thread that launched the Task.
//!
//! ## Lifecycle
//!
//! ```text
//! Created --launch--> Running --request_stop--> StopRequested
//!                        |                           |
//!                        +----------join-------------+--> Completed
//! ```
//!
//! Cancellation is cooperative: `request_stop` only sets the [`StopSignal`],
//! which the work polls at its own granularity. A worker blocked inside the
//! store is never interrupted.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use stress_core::{HarnessError, HarnessResult, WorkerError};
use tracing::debug;

/// Shared cooperative stop flag.
///
/// Written by the owning scenario, read by running work. Clones share the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// New, unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Lifecycle state of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Not launched yet
    Created,
    /// Work executing on its thread
    Running,
    /// Stop flag set; work still executing
    StopRequested,
    /// Work returned or panicked and was joined
    Completed,
}

type Outcome = Result<(), WorkerError>;

/// A unit of concurrent work owned by one scenario
pub struct Task {
    name: String,
    stop: StopSignal,
    state: TaskState,
    handle: Option<JoinHandle<Outcome>>,
    failure: Option<WorkerError>,
}

impl Task {
    /// Create a task with its own stop signal
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_stop(name, StopSignal::new())
    }

    /// Create a task sharing a scenario-wide stop signal
    pub fn with_stop(name: impl Into<String>, stop: StopSignal) -> Self {
        Task {
            name: name.into(),
            stop,
            state: TaskState::Created,
            handle: None,
            failure: None,
        }
    }

    /// Task name, also used as the thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The stop signal handed to the work
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Start `work` on a new thread. Returns without waiting for it.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Lifecycle`] if the task was already launched
    /// - [`HarnessError::Spawn`] if the OS refused to create the thread
    pub fn launch<F>(&mut self, work: F) -> HarnessResult<()>
    where
        F: FnOnce(StopSignal) -> Outcome + Send + 'static,
    {
        if self.state != TaskState::Created {
            return Err(HarnessError::Lifecycle(format!(
                "task '{}' launched twice (state {:?})",
                self.name, self.state
            )));
        }
        let stop = self.stop.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || work(stop))
            .map_err(|source| HarnessError::Spawn {
                name: self.name.clone(),
                source,
            })?;
        self.handle = Some(handle);
        self.state = TaskState::Running;
        debug!(target: "stress::task", task = %self.name, "Task launched");
        Ok(())
    }

    /// Set the cooperative stop flag. Does not interrupt blocked I/O.
    pub fn request_stop(&mut self) {
        self.stop.request();
        if self.state == TaskState::Running {
            self.state = TaskState::StopRequested;
        }
    }

    /// True once the work has returned (join will not block)
    pub fn is_finished(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => self.state == TaskState::Completed,
        }
    }

    /// Block until the work has returned or panicked, capturing its failure.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Lifecycle`] if the task was never launched or was
    /// already joined. Failures of the work itself are not errors here; read
    /// them with [`Task::failure`].
    pub fn join(&mut self) -> HarnessResult<()> {
        let handle = self.handle.take().ok_or_else(|| {
            HarnessError::Lifecycle(format!(
                "task '{}' cannot be joined in state {:?}",
                self.name, self.state
            ))
        })?;
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => Err(WorkerError::Panicked(panic_message(payload.as_ref()))),
        };
        self.failure = outcome.err();
        self.state = TaskState::Completed;
        debug!(
            target: "stress::task",
            task = %self.name,
            failed = self.failure.is_some(),
            "Task joined"
        );
        Ok(())
    }

    /// Captured failure; `None` if the work succeeded or was not joined yet
    pub fn failure(&self) -> Option<&WorkerError> {
        self.failure.as_ref()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("failure", &self.failure)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Join every task, collecting `(name, failure)` in task order.
///
/// Never stops early: neither a failing task nor a lifecycle error prevents
/// the rest from being joined. The first lifecycle error is returned after
/// every task has been visited.
pub fn join_all(tasks: &mut [Task]) -> HarnessResult<Vec<(String, WorkerError)>> {
    let mut failures = Vec::new();
    let mut lifecycle_error = None;
    for task in tasks.iter_mut() {
        if let Err(e) = task.join() {
            lifecycle_error.get_or_insert(e);
            continue;
        }
        if let Some(failure) = task.failure() {
            failures.push((task.name().to_string(), failure.clone()));
        }
    }
    match lifecycle_error {
        Some(e) => Err(e),
        None => Ok(failures),
    }
}
