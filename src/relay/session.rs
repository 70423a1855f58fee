//! Relay Session
//!
//! Owns one accepted local connection, dials exactly one remote connection,
//! and coordinates the lifetime of the two directional pipes and the traffic
//! reporter until the first failure terminates the session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::pipe::{self, Direction};
use super::reporter::TrafficReporter;
use super::terminator::Terminator;
use crate::dial::Dialer;

/// Cumulative byte counters for one session.
///
/// Incremented only by the owning pipe, read without coordination by the
/// reporter and the closing log line. Atomic with relaxed ordering: the
/// increments must not tear, but stale reads are fine for informational
/// output.
#[derive(Debug)]
pub struct SessionCounters {
    sent_bytes: AtomicU64,
    received_bytes: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self {
            sent_bytes: AtomicU64::new(0),
            received_bytes: AtomicU64::new(0),
        }
    }

    /// Bytes moved local -> remote
    pub fn sent(&self) -> u64 {
        self.sent_bytes.load(Ordering::Relaxed)
    }

    /// Bytes moved remote -> local
    pub fn received(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    pub fn add_sent(&self, bytes: u64) {
        self.sent_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_received(&self, bytes: u64) {
        self.received_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// One proxied connection: an accepted local stream paired with a remote
/// stream dialed at start
pub struct Session {
    id: u64,
    local: TcpStream,
    local_addr: SocketAddr,
    dialer: Arc<Dialer>,
    counters: Arc<SessionCounters>,
    terminator: Arc<Terminator>,
}

impl Session {
    /// Create a session around an accepted connection. Pure construction,
    /// no I/O happens until `start`.
    pub fn new(id: u64, local: TcpStream, local_addr: SocketAddr, dialer: Arc<Dialer>) -> Self {
        Self {
            id,
            local,
            local_addr,
            dialer,
            counters: Arc::new(SessionCounters::new()),
            terminator: Arc::new(Terminator::new()),
        }
    }

    /// Handle to the session's byte counters
    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    /// Handle to the session's termination coordinator
    pub fn terminator(&self) -> Arc<Terminator> {
        Arc::clone(&self.terminator)
    }

    /// Dial the remote endpoint and relay until either side fails or closes.
    ///
    /// Fire and forget: every outcome surfaces as log lines only, and no
    /// error escapes the session boundary.
    pub async fn start(self) {
        let Session {
            id,
            mut local,
            local_addr,
            dialer,
            counters,
            terminator,
        } = self;

        let remote = match dialer.connect().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(session_id = id, error = %e, "remote connection failed");
                if let Err(e) = local.shutdown().await {
                    warn!(session_id = id, error = %e, "error while closing local connection");
                }
                return;
            }
        };

        info!(
            session_id = id,
            local_addr = %local_addr,
            remote_addr = %dialer.remote_addr(),
            "opened relay session"
        );

        let (local_read, local_write) = local.into_split();
        let (remote_read, remote_write) = tokio::io::split(remote);

        let upstream = tokio::spawn(pipe::run(
            local_read,
            remote_write,
            Direction::Upstream,
            id,
            Arc::clone(&counters),
            Arc::clone(&terminator),
        ));
        let downstream = tokio::spawn(pipe::run(
            remote_read,
            local_write,
            Direction::Downstream,
            id,
            Arc::clone(&counters),
            Arc::clone(&terminator),
        ));

        let (stop_tx, stop_rx) = oneshot::channel();
        let reporter = tokio::spawn(TrafficReporter::new(id, Arc::clone(&counters)).run(stop_rx));

        // Exactly one termination event arrives here, however many failures
        // the pipes race to report
        terminator.wait().await;

        let _ = stop_tx.send(());

        info!(
            session_id = id,
            sent_bytes = counters.sent(),
            received_bytes = counters.received(),
            "closed relay session"
        );

        // Cancelling the pipes drops the stream halves, which closes both
        // connections and unblocks whichever direction is still pending
        upstream.abort();
        downstream.abort();
        let _ = tokio::join!(upstream, downstream, reporter);
    }
}
