//! tlsrelay - Transparent TCP relay with optional TLS unwrapping
//!
//! Accepts inbound connections on a local port and forwards all bytes, in
//! both directions, to a fixed remote endpoint. With `--tls` the remote leg
//! is a standard TLS client connection using system trust roots, so local
//! clients can speak the unencrypted protocol.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tlsrelay::{config::ConfigManager, Dialer, RelayServer, ShutdownCoordinator};

/// CLI arguments for tlsrelay
#[derive(Parser, Debug)]
#[command(name = "tlsrelay")]
#[command(about = "Transparent TCP relay with optional TLS termination on the remote leg")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "tlsrelay.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Local address to listen on (overrides config file)
    #[arg(short, long, help = "Local address to listen on (e.g., :6360)")]
    pub listen: Option<String>,

    /// Remote address to forward to (overrides config file)
    #[arg(short, long, help = "Remote address to forward to (host:port)")]
    pub remote: Option<String>,

    /// Terminate TLS on the remote leg, exposing it unencrypted locally
    #[arg(long, help = "Remote connection with TLS exposed unencrypted locally")]
    pub tls: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_tracing(&args)?;

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    config.merge_with_cli_args(args.listen.as_deref(), args.remote.as_deref(), args.tls);

    config
        .validate()
        .context("Configuration validation failed")?;

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Listen address: {}", config.relay.listen_addr);
        info!("  Remote address: {}", config.relay.remote_addr);
        info!(
            "  TLS unwrap: {}",
            if config.relay.tls_unwrap {
                "enabled"
            } else {
                "disabled"
            }
        );
        return Ok(());
    }

    info!(
        "Proxying from {} to {}",
        config.relay.listen_addr, config.relay.remote_addr
    );

    // Resolution and bind failures are fatal; the process exits non-zero
    let dialer = Arc::new(
        Dialer::from_config(&config)
            .await
            .context("Failed to resolve remote address")?,
    );
    let server = RelayServer::bind(&config, dialer)
        .await
        .context("Failed to open local port to listen")?;

    let shutdown_coordinator = ShutdownCoordinator::new();
    let shutdown_rx = shutdown_coordinator.subscribe();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Server error: {}", e);
        }
    });

    shutdown_coordinator.listen_for_signals().await?;

    if let Err(e) = server_handle.await {
        if !e.is_cancelled() {
            error!("Server task failed: {}", e);
        }
    }

    info!("Server shutdown complete");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
