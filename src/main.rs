use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fizikhub_gate::config::GateConfig;
use fizikhub_gate::ratelimit::RateLimitStore;
use fizikhub_gate::server::GateServer;

#[derive(Parser, Debug)]
#[command(name = "fizikhub-gate", version)]
#[command(about = "Rate limiting front gate for the FizikHub platform")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Upstream application base URL (overrides the configuration file)
    #[arg(short, long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting FizikHub gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GateConfig::from_file(&path.to_string_lossy())?,
        None => GateConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if let Some(upstream) = args.upstream {
        config.server.upstream_url = upstream;
    }

    info!(
        listen_addr = %config.server.listen_addr,
        upstream_url = %config.server.upstream_url,
        window_secs = config.rate_limiting.window_secs,
        "Configuration loaded"
    );

    // The store is constructed here and injected, not reached for as a
    // process-wide singleton.
    let store = Arc::new(RateLimitStore::new(
        Duration::from_secs(config.rate_limiting.window_secs),
        Duration::from_secs(config.rate_limiting.sweep_interval_secs),
        config.rate_limiting.max_entries,
    ));
    info!("Rate limit store initialized");

    let server = GateServer::new(&config, store)?;
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("FizikHub gate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
