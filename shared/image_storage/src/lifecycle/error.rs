//! Error types for the image lifecycle

use thiserror::Error;

use crate::metadata::MetadataStorageError;
use crate::object::ObjectStorageError;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors surfaced by lifecycle operations
///
/// Not-found is not an error: lookups return `Ok(None)` for absent, expired
/// and purged images alike.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The request was rejected before touching any store
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The object store failed
    #[error(transparent)]
    ObjectStorage(#[from] ObjectStorageError),

    /// The metadata store failed
    #[error(transparent)]
    MetadataStorage(#[from] MetadataStorageError),
}
