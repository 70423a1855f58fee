//! Directional Pipe
//!
//! A unidirectional byte-copy loop from one stream to another with byte
//! accounting. Two pipes run per session, one per direction, sharing only the
//! session counters and the termination coordinator.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::session::SessionCounters;
use super::terminator::Terminator;

/// Copy buffer size. 0xFFFF, one byte short of 64 KiB, matching the observed
/// chunking behavior of the relay.
pub const COPY_BUFFER_SIZE: usize = 0xffff;

/// Which way a pipe moves bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local client to remote endpoint
    Upstream,
    /// Remote endpoint to local client
    Downstream,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }

    fn read_context(self) -> &'static str {
        match self {
            Direction::Upstream => "local read failed",
            Direction::Downstream => "remote read failed",
        }
    }

    fn write_context(self) -> &'static str {
        match self {
            Direction::Upstream => "remote write failed",
            Direction::Downstream => "local write failed",
        }
    }
}

/// Copy bytes from `src` to `dst` until either side fails or closes.
///
/// Every outcome is reported to the terminator; the first report per session
/// wins and all later ones are suppressed there.
pub async fn run<R, W>(
    mut src: R,
    mut dst: W,
    direction: Direction,
    session_id: u64,
    counters: Arc<SessionCounters>,
    terminator: Arc<Terminator>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    loop {
        let n = match src.read(&mut buf).await {
            // Graceful peer close, expected and not an anomaly
            Ok(0) => {
                terminator.report_closure(session_id, direction);
                return;
            }
            Ok(n) => n,
            Err(e) => {
                terminator.report_failure(session_id, direction.read_context(), &e);
                return;
            }
        };

        if let Err(e) = dst.write_all(&buf[..n]).await {
            terminator.report_failure(session_id, direction.write_context(), &e);
            return;
        }
        if let Err(e) = dst.flush().await {
            terminator.report_failure(session_id, direction.write_context(), &e);
            return;
        }

        match direction {
            Direction::Upstream => counters.add_sent(n as u64),
            Direction::Downstream => counters.add_received(n as u64),
        }
    }
}
