use std::time::Duration;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use lvsd::backend::CommandBackend;
use lvsd::config::Config;
use lvsd::handle::MirrorHandle;
use lvsd::mirror::{DaemonOutcome, Mirror, MirrorSettings};
use lvsd::reconciler;

fn log_daemon_outcome(action: &str, outcome: &DaemonOutcome) {
    for (role, result) in [("master", &outcome.master), ("backup", &outcome.backup)] {
        if let Err(e) = result {
            tracing::error!("Failed to {} {} sync daemon: {}", action, role, e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lvsd=info"))
        )
        .init();

    tracing::info!("Starting lvsd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/lvsd/lvsd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Commands are driven on this runtime from the mirror thread
    let backend = CommandBackend::new(
        tokio::runtime::Handle::current(),
        Duration::from_secs(config.ipvsadm.command_timeout_secs),
    );
    let mirror = Mirror::new(backend, MirrorSettings::from_config(&config));
    let mirror_handle = MirrorHandle::spawn(mirror);

    mirror_handle
        .check_tool()
        .await
        .context("ipvsadm is required")?;

    mirror_handle
        .set_timeouts(config.timeouts)
        .await
        .context("Failed to set connection timeouts")?;

    // Adopt whatever the kernel already holds
    let report = mirror_handle
        .save()
        .await
        .context("Failed to read the live rule table")?;
    tracing::info!(
        "Loaded {} services from live table, fingerprint {}",
        report.services,
        mirror_handle.fingerprint()
    );

    let outcome = mirror_handle.start_daemon().await?;
    log_daemon_outcome("start", &outcome);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn reconciler task
    let rec_cancel = cancel.clone();
    let rec_mirror = mirror_handle.clone();
    let rec_period = Duration::from_secs(config.reconcile.interval_secs);
    let rec_handle = tokio::spawn(async move {
        if let Err(e) = reconciler::run(rec_mirror, rec_period, rec_cancel).await {
            tracing::error!("Reconciler error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();
    let _ = rec_handle.await;

    match mirror_handle.stop_daemon().await {
        Ok(outcome) => log_daemon_outcome("stop", &outcome),
        Err(e) => tracing::error!("Failed to stop sync daemons: {}", e),
    }

    // Shutdown mirror thread
    if let Err(e) = mirror_handle.shutdown().await {
        tracing::error!("Failed to shutdown mirror: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
