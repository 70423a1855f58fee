//! Configuration loading and validation
//!
//! Priority order, highest to lowest: command-line arguments, configuration
//! file, environment variables, built-in defaults.

use anyhow::{anyhow, Context};
use std::path::Path;
use tracing::{debug, info};

use super::types::Config;
use crate::Result;

/// Handles loading configuration from files and the environment
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Ok(listen) = std::env::var("TLSRELAY_LISTEN_ADDR") {
            debug!("Using listen address from environment: {}", listen);
            config.relay.listen_addr = listen;
        }
        if let Ok(remote) = std::env::var("TLSRELAY_REMOTE_ADDR") {
            debug!("Using remote address from environment: {}", remote);
            config.relay.remote_addr = remote;
        }
        if let Ok(tls) = std::env::var("TLSRELAY_TLS_UNWRAP") {
            config.relay.tls_unwrap = tls
                .parse()
                .map_err(|_| anyhow!("TLSRELAY_TLS_UNWRAP must be true or false, got '{}'", tls))?;
        }
        if let Ok(timeout) = std::env::var("TLSRELAY_SHUTDOWN_TIMEOUT") {
            config.relay.shutdown_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| anyhow!("Invalid TLSRELAY_SHUTDOWN_TIMEOUT '{}': {}", timeout, e))?;
        }
        if let Ok(level) = std::env::var("TLSRELAY_LOG_LEVEL") {
            config.logging.log_level = level;
        }

        Ok(config)
    }
}

impl Config {
    /// Apply CLI argument overrides (highest priority)
    pub fn merge_with_cli_args(
        &mut self,
        listen: Option<&str>,
        remote: Option<&str>,
        tls_unwrap: bool,
    ) {
        if let Some(listen) = listen {
            self.relay.listen_addr = listen.to_string();
        }
        if let Some(remote) = remote {
            self.relay.remote_addr = remote.to_string();
        }
        if tls_unwrap {
            self.relay.tls_unwrap = true;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let listen = normalize_listen_addr(&self.relay.listen_addr);
        listen
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow!("Invalid listen address '{}': {}", self.relay.listen_addr, e))?;

        split_host_port(&self.relay.remote_addr)
            .with_context(|| format!("Invalid remote address '{}'", self.relay.remote_addr))?;

        match self.logging.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(anyhow!("Invalid log level '{}'", other)),
        }

        Ok(())
    }
}

/// Expand a leading-colon listen address (":6360") to bind all interfaces
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Split a "host:port" string, validating the port
pub fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Address '{}' is missing a port", addr))?;
    if host.is_empty() {
        return Err(anyhow!("Address '{}' is missing a host", addr));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow!("Address '{}' has an invalid port", addr))?;
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_listen_addr() {
        assert_eq!(normalize_listen_addr(":6360"), "0.0.0.0:6360");
        assert_eq!(normalize_listen_addr("127.0.0.1:6360"), "127.0.0.1:6360");
    }

    #[test]
    fn test_split_host_port() {
        let (host, port) = split_host_port("remote_server.test:636").unwrap();
        assert_eq!(host, "remote_server.test");
        assert_eq!(port, 636);

        assert!(split_host_port("no-port").is_err());
        assert!(split_host_port(":636").is_err());
        assert!(split_host_port("host:notaport").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relay.listen_addr, ":6360");
        assert_eq!(config.relay.remote_addr, "remote_server.test:636");
        assert!(!config.relay.tls_unwrap);
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
