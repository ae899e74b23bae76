//! Expiration worker
//!
//! Periodically expires shared images whose lifetime has passed, or runs a
//! single sweep for cron style triggers.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Command line arguments
pub mod cli;

/// Health check server
pub mod health;

/// Configuration types
pub mod types;

/// Sweep entry points
pub mod worker;
