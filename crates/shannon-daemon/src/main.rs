//! shannon-daemon — binds the workflow engine to HTTP (spec §6 "External
//! interfaces"): submit/status/signal endpoints, SSE event streaming, and
//! the session API. Reads configuration from `SHANNON_DAEMON_CONFIG` (or
//! `config/daemon.toml`), falling back to defaults for anything missing.

use anyhow::{Context, Result};
use tracing::info;

use shannon_daemon::config::DaemonConfig;
use shannon_daemon::daemon::Daemon;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    shannon_telemetry::logging::init_logging("shannon-daemon", "info");

    let config = match std::env::var("SHANNON_DAEMON_CONFIG") {
        Ok(path) => DaemonConfig::load_or_default(path),
        Err(_) => DaemonConfig::load_or_default(DaemonConfig::default_config_path()),
    };

    info!(bind_addr = %config.bind_addr(), "shannon daemon starting");

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind API listener on {}", config.bind_addr()))?;

    let daemon = Daemon::new(config)
        .await
        .context("failed to initialize daemon")?;
    let shutdown = daemon.shutdown_handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run_with_listener(listener).await?;
    info!("shannon daemon stopped");
    Ok(())
}
