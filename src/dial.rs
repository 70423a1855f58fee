//! Remote Dialing
//!
//! Resolves the fixed remote endpoint once at startup and hands each session
//! a freshly dialed connection, either plain TCP or a TLS client stream that
//! terminates the remote encryption ("TLS unwrap").

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::config::split_host_port;
use crate::Result;

/// A bidirectional byte stream usable as the remote leg of a session
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Remote connection handed to a session, plain or TLS
pub type RemoteStream = Box<dyn Transport>;

/// Dials the configured remote endpoint for every session
pub struct Dialer {
    remote_addr: SocketAddr,
    remote_name: String,
    tls: Option<TlsTarget>,
}

struct TlsTarget {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl Dialer {
    /// Create a dialer for plain TCP forwarding
    pub async fn plain(remote: &str) -> Result<Self> {
        let remote_addr = resolve_remote_addr(remote).await?;
        Ok(Self {
            remote_addr,
            remote_name: remote.to_string(),
            tls: None,
        })
    }

    /// Create a dialer that terminates TLS on the remote leg using system
    /// default trust roots
    pub async fn tls_unwrap(remote: &str) -> Result<Self> {
        let remote_addr = resolve_remote_addr(remote).await?;
        let (host, _) = split_host_port(remote)?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| anyhow!("Invalid TLS server name '{}'", host))?;
        let connector = build_tls_connector()?;

        Ok(Self {
            remote_addr,
            remote_name: remote.to_string(),
            tls: Some(TlsTarget {
                connector,
                server_name,
            }),
        })
    }

    /// Create a dialer according to the configured relay mode
    pub async fn from_config(config: &crate::Config) -> Result<Self> {
        if config.relay.tls_unwrap {
            Self::tls_unwrap(&config.relay.remote_addr).await
        } else {
            Self::plain(&config.relay.remote_addr).await
        }
    }

    /// Resolved remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Remote endpoint as configured (host:port)
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Whether the remote leg is TLS terminated
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Dial one new remote connection
    pub async fn connect(&self) -> Result<RemoteStream> {
        let stream = TcpStream::connect(self.remote_addr)
            .await
            .with_context(|| format!("Failed to connect to remote {}", self.remote_name))?;
        debug!("Connected to remote {}", self.remote_addr);

        match &self.tls {
            None => Ok(Box::new(stream)),
            Some(tls) => {
                let stream = tls
                    .connector
                    .connect(tls.server_name.clone(), stream)
                    .await
                    .with_context(|| format!("TLS handshake with {} failed", self.remote_name))?;
                debug!("Completed TLS handshake with {}", self.remote_name);
                Ok(Box::new(stream))
            }
        }
    }
}

/// Resolve the remote host:port to a socket address, failing fast at startup
async fn resolve_remote_addr(remote: &str) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = lookup_host(remote)
        .await
        .with_context(|| format!("Failed to resolve remote address '{}'", remote))?
        .collect();
    debug!("Resolved {} to {} addresses", remote, addrs.len());

    addrs
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Remote address '{}' resolved to no addresses", remote))
}

/// Build a TLS connector backed by the platform certificate store
fn build_tls_connector() -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    for cert in native_certs.certs {
        let _ = roots.add(cert);
    }
    if !native_certs.errors.is_empty() {
        warn!(
            "Native certificate loading reported {} issues, continuing with available roots",
            native_certs.errors.len()
        );
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(client_config)))
}
