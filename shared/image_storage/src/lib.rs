//! Storage and expiration lifecycle for shared images
//!
//! This crate is shared between the backend and the expiration worker. It holds the
//! image record, the object store (S3) and metadata store (`DynamoDB`) adapters, and
//! the lifecycle engine that moves images from active to expired.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

pub mod image;
pub mod lifecycle;
pub mod metadata;
pub mod object;

/// In-memory adapters for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
