//! Error types for object store operations

use aws_sdk_s3::{
    config::http::HttpResponse,
    error::SdkError,
    operation::{
        delete_object::DeleteObjectError, get_object::GetObjectError,
        head_bucket::HeadBucketError,
    },
    primitives::ByteStreamError,
};
use thiserror::Error;

/// Result type for object store operations
pub type ObjectStorageResult<T> = Result<T, ObjectStorageError>;

/// Errors that can occur during object store operations
#[derive(Error, Debug)]
pub enum ObjectStorageError {
    /// S3 service error
    #[error("S3 service error: {0}")]
    S3Error(String),

    /// AWS SDK error (dispatch, timeout, credentials)
    #[error("AWS SDK error: {0}")]
    AwsError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Upstream service error (5xx from S3)
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// Failed to read the object body
    #[error("Failed to read object body: {0}")]
    BodyError(String),
}

/// Classifies an SDK error, 5xx service responses become `UpstreamError`
fn classify<E: std::fmt::Debug>(error: SdkError<E, HttpResponse>) -> ObjectStorageError {
    match error {
        SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() >= 500 => {
            ObjectStorageError::UpstreamError(format!("{:?}", service_err.err()))
        }
        SdkError::ServiceError(service_err) => {
            ObjectStorageError::S3Error(format!("{:?}", service_err.err()))
        }
        other => ObjectStorageError::AwsError(format!("{other:?}")),
    }
}

impl From<SdkError<GetObjectError>> for ObjectStorageError {
    fn from(error: SdkError<GetObjectError>) -> Self {
        classify(error)
    }
}

impl From<SdkError<DeleteObjectError>> for ObjectStorageError {
    fn from(error: SdkError<DeleteObjectError>) -> Self {
        classify(error)
    }
}

impl From<SdkError<HeadBucketError>> for ObjectStorageError {
    fn from(error: SdkError<HeadBucketError>) -> Self {
        classify(error)
    }
}

impl From<ByteStreamError> for ObjectStorageError {
    fn from(error: ByteStreamError) -> Self {
        Self::BodyError(error.to_string())
    }
}
