//! Traffic Reporter
//!
//! Best-effort periodic visibility into per-session throughput. Counter reads
//! race with the pipes by design; a slightly stale total is acceptable for a
//! purely informational log line.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use super::session::SessionCounters;

/// Fixed reporting interval, preserved as observed behavior
pub const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically logs cumulative byte counts, silent when nothing changed
pub struct TrafficReporter {
    session_id: u64,
    counters: Arc<SessionCounters>,
}

/// Last observed counter totals
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgressSnapshot {
    sent: u64,
    received: u64,
}

impl ProgressSnapshot {
    /// Record the current totals, returning true when either counter moved
    /// since the previous observation
    pub(crate) fn advance(&mut self, sent: u64, received: u64) -> bool {
        if self.sent == sent && self.received == received {
            return false;
        }
        self.sent = sent;
        self.received = received;
        true
    }
}

impl TrafficReporter {
    pub fn new(session_id: u64, counters: Arc<SessionCounters>) -> Self {
        Self {
            session_id,
            counters,
        }
    }

    /// Run until the session sends the stop signal
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        // The first tick fires immediately; consume it so reports start one
        // full interval in
        interval.tick().await;

        let mut snapshot = ProgressSnapshot::default();

        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!(session_id = self.session_id, "traffic reporter stopped");
                    return;
                }
                _ = interval.tick() => {
                    let sent = self.counters.sent();
                    let received = self.counters.received();
                    if snapshot.advance(sent, received) {
                        info!(
                            session_id = self.session_id,
                            sent_bytes = sent,
                            received_bytes = received,
                            "session traffic"
                        );
                    }
                }
            }
        }
    }
}
