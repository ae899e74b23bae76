//! Object store for image content
//!
//! The object store holds the uploaded bytes. Uploads never pass through the
//! service: the uploader receives a presigned PUT URL and writes directly to the bucket.

mod error;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    error::SdkError, operation::get_object::GetObjectError, presigning::PresigningConfig,
    Client as S3Client,
};

pub use error::{ObjectStorageError, ObjectStorageResult};

/// Presigned write and read URLs for a single object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrls {
    /// Presigned PUT URL the uploader writes the content to
    pub upload_url: String,
    /// Presigned GET URL for reading the content
    pub download_url: String,
}

/// Capabilities the lifecycle engine needs from an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issues a write URL and a read URL for `key`, both valid for `ttl`
    async fn create_upload_and_download_urls(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> ObjectStorageResult<PresignedUrls>;

    /// Reads the object at `key`, `None` when it does not exist
    async fn fetch_object(&self, key: &str) -> ObjectStorageResult<Option<Vec<u8>>>;

    /// Deletes the object at `key`, succeeding when it is already gone
    async fn delete_object(&self, key: &str) -> ObjectStorageResult<()>;

    /// Verifies that the store is reachable
    async fn check_connectivity(&self) -> ObjectStorageResult<()>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    s3_client: Arc<S3Client>,
    bucket_name: String,
}

impl S3ObjectStore {
    /// Creates a new S3 object store
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    /// * `bucket_name` - S3 bucket name for image storage
    #[must_use]
    pub const fn new(s3_client: Arc<S3Client>, bucket_name: String) -> Self {
        Self {
            s3_client,
            bucket_name,
        }
    }

    fn presigning_config(ttl: Duration) -> ObjectStorageResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|e| {
            ObjectStorageError::ConfigError(format!("Failed to create presigning config: {e}"))
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_upload_and_download_urls(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> ObjectStorageResult<PresignedUrls> {
        let upload_url = self
            .s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| {
                ObjectStorageError::S3Error(format!("Failed to presign upload for {key}: {e}"))
            })?;

        let download_url = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| {
                ObjectStorageError::S3Error(format!("Failed to presign download for {key}: {e}"))
            })?;

        Ok(PresignedUrls {
            upload_url: upload_url.uri().to_string(),
            download_url: download_url.uri().to_string(),
        })
    }

    async fn fetch_object(&self, key: &str) -> ObjectStorageResult<Option<Vec<u8>>> {
        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = output.body.collect().await?.into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    async fn delete_object(&self, key: &str) -> ObjectStorageResult<()> {
        // S3 answers 204 for missing keys as well
        self.s3_client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await?;

        Ok(())
    }

    async fn check_connectivity(&self) -> ObjectStorageResult<()> {
        self.s3_client
            .head_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await?;

        Ok(())
    }
}
