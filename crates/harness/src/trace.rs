//! Scenario trace instrumentation
//!
//! An ordered log of rendezvous arrivals and shutdown calls. Arrivals are
//! recorded by the latch while it holds its own lock, so the trace order is
//! the order in which the countdown actually moved.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// One instrumented event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A participant counted the latch down to `remaining`
    Arrived {
        /// Participant index
        participant: usize,
        /// Latch count after this arrival
        remaining: usize,
    },
    /// A participant is about to issue the shutdown command
    ShutdownIssued {
        /// Participant index
        participant: usize,
    },
}

/// Shared, append-only event log
#[derive(Debug, Clone, Default)]
pub struct ScenarioTrace {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl ScenarioTrace {
    /// Empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }
}

/// Check that the countdown went `parties-1, ..., 0` one step at a time and
/// that no shutdown was issued before it reached zero.
///
/// Returns a description of the first violation.
pub fn check_rendezvous(events: &[TraceEvent], parties: usize) -> Result<(), String> {
    let mut expected = parties;
    for (index, event) in events.iter().enumerate() {
        match event {
            TraceEvent::Arrived {
                participant,
                remaining,
            } => {
                if *remaining + 1 != expected {
                    return Err(format!(
                        "event {}: participant {} moved the latch from {} to {}",
                        index, participant, expected, remaining
                    ));
                }
                expected = *remaining;
            }
            TraceEvent::ShutdownIssued { participant } => {
                if expected != 0 {
                    return Err(format!(
                        "event {}: participant {} issued shutdown with {} participant(s) outstanding",
                        index, participant, expected
                    ));
                }
            }
        }
    }
    if expected != 0 {
        return Err(format!(
            "only {} of {} participants arrived",
            parties - expected,
            parties
        ));
    }
    Ok(())
}
