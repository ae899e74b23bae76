use std::time::Duration;

use clap::Parser;

/// Expires shared images on a schedule
#[derive(Debug, Clone, Parser)]
#[command(name = "expiration-worker", version, about)]
pub struct Args {
    /// Run a single sweep and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between sweeps
    #[arg(
        long,
        env = "SWEEP_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_secs: u64,
}

impl Args {
    /// Interval between sweeps
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
