//! Relay Server
//!
//! Binds the local listener and accepts connections, spawning one detached
//! session per accepted stream. Sessions share nothing with each other beyond
//! the acceptor's monotonically increasing id counter.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::{normalize_listen_addr, Config};
use crate::dial::Dialer;
use crate::relay::Session;
use crate::Result;

/// Accepts local connections and hands each one to a relay session
pub struct RelayServer {
    listener: TcpListener,
    dialer: Arc<Dialer>,
    next_session_id: AtomicU64,
}

impl RelayServer {
    /// Bind the local listener. Bind failure is fatal and propagates to the
    /// caller.
    pub async fn bind(config: &Config, dialer: Arc<Dialer>) -> Result<Self> {
        let listen_addr = normalize_listen_addr(&config.relay.listen_addr);
        let listener = TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("Failed to open local port to listen on {}", listen_addr))?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            dialer,
            next_session_id: AtomicU64::new(0),
        })
    }

    /// The actually bound local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the shutdown signal arrives.
    ///
    /// Accept errors are logged and never abort the loop; a failed or stalled
    /// session never affects other sessions or the acceptor.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "Relaying connections to {}{}",
            self.dialer.remote_name(),
            if self.dialer.is_tls() {
                " (TLS unwrap)"
            } else {
                ""
            }
        );

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!(session_id = id, peer_addr = %peer_addr, "accepted connection");

                            let session = Session::new(id, stream, peer_addr, Arc::clone(&self.dialer));
                            tokio::spawn(session.start());
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    break;
                }
            }
        }

        Ok(())
    }
}
