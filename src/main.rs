//! Weighted Least Connections Load Balancer
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                WLC BALANCER                  │
//!                     │                                              │
//!   Client Request    │  ┌──────────┐    ┌────────────┐              │
//!   ──────────────────┼─▶│   http   │───▶│ dispatcher │              │
//!                     │  │  server  │    └─────┬──────┘              │
//!                     │  └────┬─────┘          │ select              │
//!                     │       │ /health        ▼                     │
//!                     │       │ /metrics ┌────────────┐              │
//!                     │       └─────────▶│ ServerPool │◀──┐          │
//!                     │                  └─────┬──────┘   │ probe    │
//!                     │                        │          │          │
//!                     │                        ▼    ┌─────┴──────┐   │
//!   Client Response   │                  ┌──────────┐│  health    │   │
//!   ◀─────────────────┼──────────────────│ forwarder││  monitor   │   │
//!                     │                  └────┬─────┘└────────────┘   │
//!                     └───────────────────────┼──────────────────────┘
//!                                             ▼
//!                                         Backends
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use wlc_balancer::config::{self, ConfigError, ProxyConfig};
use wlc_balancer::lifecycle::{signals, Shutdown};
use wlc_balancer::observability::logging;
use wlc_balancer::HttpServer;

#[derive(Parser)]
#[command(name = "wlc-balancer")]
#[command(version, about = "Weighted least connections HTTP load balancer", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inline backend list, e.g. "localhost:8081/5, localhost:8082/1".
    #[arg(short, long)]
    backends: Option<String>,

    /// Listen address, overrides the configuration file.
    #[arg(long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(cli).await?;

    logging::init(&config.observability.log_level);
    tracing::info!("wlc-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        health_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    // Fails before anything is bound if a backend is invalid.
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Merge the config file, command line and (as a last resort) an interactive
/// prompt into one validated configuration.
async fn build_config(cli: Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(list) = &cli.backends {
        config.backends = config::parse_backend_list(list)?;
    } else if config.backends.is_empty() {
        config.backends = config::parse_backend_list(&prompt_for_backends().await?)?;
    }

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    config::validate_config(&config)?;
    Ok(config)
}

async fn prompt_for_backends() -> Result<String, std::io::Error> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            b"--- Weighted Least Connection Load Balancer ---\n\
              Enter backend servers with weights separated by commas.\n\
              Format: host:port/weight, host:port/weight\n\
              Example: localhost:8081/5, localhost:8082/1\n> ",
        )
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line)
}
