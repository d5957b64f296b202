use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::handle::MirrorHandle;

/// Reconciler event loop: periodically rebuilds the mirror from the live
/// table so that changes made behind the daemon's back are picked up. A
/// zero `period` disables it and the task only waits for cancellation.
pub async fn run(
    mirror: MirrorHandle,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    if period.is_zero() {
        tracing::info!("Periodic reconcile disabled");
        cancel.cancelled().await;
        return Ok(());
    }

    // the mirror is loaded at startup, so the first pass waits a full period
    let mut reconcile_interval = interval_at(Instant::now() + period, period);
    reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = reconcile_interval.tick() => {
                let before = mirror.fingerprint();
                match mirror.save().await {
                    Ok(report) => {
                        if mirror.fingerprint() != before {
                            tracing::info!("Live table changed, mirror now holds {} services", report.services);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to reconcile mirror: {}", e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Reconciler shutting down");
                break;
            }
        }
    }

    Ok(())
}
