//! Shared images backend service
//!
//! Issues upload intents for expiring images, serves their content and
//! metadata until they expire, and optionally runs the expiration sweep
//! in-process.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// HTTP routes
pub mod routes;

/// HTTP server setup
pub mod server;

/// Configuration and API types
pub mod types;
