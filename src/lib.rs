//! tlsrelay Library
//!
//! A transparent TCP relay: inbound connections on a local port are forwarded,
//! byte for byte and in both directions, to a fixed remote endpoint. In TLS
//! unwrap mode the remote leg is a standard TLS client connection using system
//! trust roots, so local clients can speak the unencrypted protocol against an
//! encrypted service.

pub mod config;
pub mod dial;
pub mod relay;
pub mod server;
pub mod shutdown;

pub use config::Config;
pub use dial::Dialer;
pub use relay::Session;
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the relay
pub type Result<T> = anyhow::Result<T>;
