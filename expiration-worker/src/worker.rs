use std::time::Duration;

use image_storage::lifecycle::{ExpirationSweeper, ImageLifecycle, SweepReport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::health;

/// Runs one sweep and logs its report
///
/// The logged report is the only acknowledgement a scheduled trigger gets.
pub async fn run_once(lifecycle: &ImageLifecycle) -> SweepReport {
    info!("Running single expiration sweep");
    let report = lifecycle.sweep_expired().await;
    match serde_json::to_string(&report) {
        Ok(json) => info!(report = %json, "Expiration sweep acknowledged"),
        Err(e) => error!("Failed to serialize sweep report: {e}"),
    }
    report
}

/// Sweeps every `interval` until `shutdown_token` is cancelled
///
/// A health check server runs alongside the sweeps on `health_port`.
///
/// # Errors
///
/// Returns an error if the health server fails
pub async fn run_loop(
    lifecycle: ImageLifecycle,
    interval: Duration,
    health_port: u16,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let health_token = shutdown_token.clone();
    let health_handle = tokio::spawn(async move {
        health::start_health_server(health_port, health_token).await
    });

    let sweeps = ExpirationSweeper::new(lifecycle, interval, shutdown_token.clone())
        .run()
        .await;
    info!("Completed {sweeps} expiration sweeps");

    // The sweeper only returns on shutdown, make sure the health server follows
    shutdown_token.cancel();
    health_handle.await??;

    Ok(())
}
