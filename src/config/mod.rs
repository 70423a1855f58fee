//! Configuration module

pub mod manager;
pub mod types;

pub use manager::{normalize_listen_addr, split_host_port, ConfigManager};
pub use types::{Config, LoggingConfig, RelayConfig};
