use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ImageLifecycle;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Runs [`ImageLifecycle::sweep_expired`] on a fixed interval
///
/// A sweep that outlasts the interval delays the next tick instead of queuing
/// extra runs, so at most one sweep per sweeper is in flight.
pub struct ExpirationSweeper {
    lifecycle: ImageLifecycle,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl ExpirationSweeper {
    /// Creates a new `ExpirationSweeper`
    ///
    /// Intervals below one second are raised to one second.
    #[must_use]
    pub fn new(
        lifecycle: ImageLifecycle,
        interval: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            lifecycle,
            interval: interval.max(MIN_INTERVAL),
            shutdown_token,
        }
    }

    /// Runs sweeps until the shutdown token is cancelled
    ///
    /// The first sweep starts immediately. A sweep already in progress when
    /// shutdown is requested runs to completion. Returns the number of sweeps run.
    pub async fn run(self) -> usize {
        info!(interval_secs = self.interval.as_secs(), "Expiration sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweeps = 0;

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Expiration sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.lifecycle.sweep_expired().await;
                    sweeps += 1;
                }
            }
        }

        info!(sweeps, "Expiration sweeper stopped");
        sweeps
    }
}
