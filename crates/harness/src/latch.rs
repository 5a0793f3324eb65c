//! Rendezvous latch
//!
//! A countdown barrier for a fixed set of participants `0..parties`. Each
//! participant counts down at most once; repeated count-downs by the same
//! participant are no-ops, so a drop guard can safely count down again on an
//! error path. Nobody returns from [`RendezvousLatch::wait`] until the count
//! reaches zero.

use crate::trace::{ScenarioTrace, TraceEvent};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

struct LatchState {
    remaining: usize,
    arrived: Vec<bool>,
}

/// Countdown barrier with per-participant idempotent arrival
pub struct RendezvousLatch {
    parties: usize,
    state: Mutex<LatchState>,
    released: Condvar,
    trace: Option<ScenarioTrace>,
}

impl RendezvousLatch {
    /// Latch for `parties` participants
    pub fn new(parties: usize) -> Self {
        RendezvousLatch {
            parties,
            state: Mutex::new(LatchState {
                remaining: parties,
                arrived: vec![false; parties],
            }),
            released: Condvar::new(),
            trace: None,
        }
    }

    /// Latch that records every arrival into `trace`
    pub fn with_trace(parties: usize, trace: ScenarioTrace) -> Self {
        RendezvousLatch {
            trace: Some(trace),
            ..Self::new(parties)
        }
    }

    /// Number of participants
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Participants that have not arrived yet
    pub fn count(&self) -> usize {
        self.state.lock().remaining
    }

    /// Record the arrival of `participant`; returns the remaining count.
    ///
    /// Arriving twice, or with an index outside `0..parties`, changes nothing.
    pub fn count_down(&self, participant: usize) -> usize {
        let mut state = self.state.lock();
        if participant >= self.parties {
            warn!(
                target: "stress::shutdown",
                participant,
                parties = self.parties,
                "Ignoring arrival of unknown participant"
            );
            return state.remaining;
        }
        if !state.arrived[participant] {
            state.arrived[participant] = true;
            state.remaining -= 1;
            if let Some(trace) = &self.trace {
                trace.record(TraceEvent::Arrived {
                    participant,
                    remaining: state.remaining,
                });
            }
            if state.remaining == 0 {
                self.released.notify_all();
            }
        }
        state.remaining
    }

    /// Block until every participant has arrived
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.remaining > 0 {
            self.released.wait(&mut state);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    /// Returns true if the latch was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.remaining > 0 {
            if self.released.wait_until(&mut state, deadline).timed_out() {
                return state.remaining == 0;
            }
        }
        true
    }

    /// Arrival guard for `participant`; counts down on drop if the holder
    /// never arrived explicitly, so an early error cannot strand the others.
    pub fn arrival(self: &Arc<Self>, participant: usize) -> Arrival {
        Arrival {
            latch: Arc::clone(self),
            participant,
        }
    }
}

/// Drop guard returned by [`RendezvousLatch::arrival`]
pub struct Arrival {
    latch: Arc<RendezvousLatch>,
    participant: usize,
}

impl Arrival {
    /// Count down and wait for everyone else
    pub fn arrive_and_wait(&self) {
        self.latch.count_down(self.participant);
        self.latch.wait();
    }
}

impl Drop for Arrival {
    fn drop(&mut self) {
        self.latch.count_down(self.participant);
    }
}
