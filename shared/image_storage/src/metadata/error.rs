//! Error types for image metadata storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    delete_item::DeleteItemError, describe_table::DescribeTableError, get_item::GetItemError,
    put_item::PutItemError, scan::ScanError, update_item::UpdateItemError,
};
use thiserror::Error;

/// Result type alias for metadata storage operations
pub type MetadataStorageResult<T> = Result<T, MetadataStorageError>;

/// Storage error types for image metadata operations
#[derive(Debug, Error)]
pub enum MetadataStorageError {
    /// Failed to insert image into `DynamoDB`
    #[error("Failed to insert image into DynamoDB: {0:?}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to get image from `DynamoDB`
    #[error("Failed to get image from DynamoDB: {0:?}")]
    DynamoDbGetError(#[from] SdkError<GetItemError>),

    /// Failed to scan images from `DynamoDB`
    #[error("Failed to scan images from DynamoDB: {0:?}")]
    DynamoDbScanError(#[from] SdkError<ScanError>),

    /// Failed to update image in `DynamoDB`
    #[error("Failed to update image in DynamoDB: {0:?}")]
    DynamoDbUpdateError(#[from] SdkError<UpdateItemError>),

    /// Failed to delete image from `DynamoDB`
    #[error("Failed to delete image from DynamoDB: {0:?}")]
    DynamoDbDeleteError(#[from] SdkError<DeleteItemError>),

    /// Failed to describe the images table
    #[error("Failed to describe images table: {0:?}")]
    DynamoDbDescribeError(#[from] SdkError<DescribeTableError>),

    /// The image to update does not exist
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// The store could not serve the request
    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),

    /// Failed to convert between image and `DynamoDB` item
    #[error("Failed to serialize image: {0}")]
    SerializationError(String),
}

impl From<serde_dynamo::Error> for MetadataStorageError {
    fn from(err: serde_dynamo::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
