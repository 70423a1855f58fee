//! Termination Coordinator
//!
//! Ensures exactly one termination event reaches a session regardless of how
//! many failures the two pipes report concurrently. Closing one connection
//! makes the other direction's blocked read fail as a side effect; that
//! secondary error must be swallowed, not logged.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::pipe::Direction;

const ACTIVE: u8 = 0;
const TERMINATING: u8 = 1;
const TERMINATED: u8 = 2;

/// Session termination phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Terminating,
    Terminated,
}

/// Single-fire termination signal shared by the two pipes and the session
#[derive(Debug)]
pub struct Terminator {
    phase: AtomicU8,
    stopped: Notify,
}

impl Terminator {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ACTIVE),
            stopped: Notify::new(),
        }
    }

    /// Report a clean end-of-stream. Expected closure, never logged as an
    /// anomaly.
    pub fn report_closure(&self, session_id: u64, direction: Direction) {
        if !self.begin_termination() {
            return;
        }
        debug!(
            session_id,
            direction = direction.as_str(),
            "peer closed stream"
        );
        self.stopped.notify_one();
    }

    /// Report an I/O failure. The first report wins and is logged with its
    /// context; later reports are no-ops.
    pub fn report_failure(&self, session_id: u64, context: &str, err: &std::io::Error) {
        if !self.begin_termination() {
            return;
        }
        warn!(session_id, context, error = %err, "relay I/O failed");
        self.stopped.notify_one();
    }

    /// Block until termination has been signaled exactly once
    pub async fn wait(&self) {
        self.stopped.notified().await;
        self.phase.store(TERMINATED, Ordering::Release);
    }

    /// Current termination phase
    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            ACTIVE => Phase::Active,
            TERMINATING => Phase::Terminating,
            _ => Phase::Terminated,
        }
    }

    /// First caller transitions Active -> Terminating and owns the signal
    fn begin_termination(&self) -> bool {
        self.phase
            .compare_exchange(ACTIVE, TERMINATING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Terminator {
    fn default() -> Self {
        Self::new()
    }
}
