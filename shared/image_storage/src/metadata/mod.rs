//! Image metadata storage using Dynamo DB
//!
//! Every image keeps its metadata item forever. Expiration only flips
//! `isExpiredFlag`; the item itself is never removed by the lifecycle.

mod error;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::{error::SdkError, types::AttributeValue, Client as DynamoDbClient};
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::warn;

pub use error::{MetadataStorageError, MetadataStorageResult};

use crate::image::{unix_seconds, Image, ImageAttribute};

/// Capabilities the lifecycle engine needs from a metadata store
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Writes the image record, replacing any record with the same ID
    async fn put(&self, image: &Image) -> MetadataStorageResult<()>;

    /// Point lookup by ID
    async fn get_by_id(&self, id: &str) -> MetadataStorageResult<Option<Image>>;

    /// Removes the record with the given ID
    async fn delete_by_id(&self, id: &str) -> MetadataStorageResult<()>;

    /// Records with `expiresAt < now` or `isExpiredFlag = true`
    async fn scan_expired_or_flagged(&self, now: DateTime<Utc>)
        -> MetadataStorageResult<Vec<Image>>;

    /// Every record in the store
    async fn scan_all(&self) -> MetadataStorageResult<Vec<Image>>;

    /// Sets `isExpiredFlag` to true, a no-op in effect when already set
    ///
    /// Returns `MetadataStorageError::ImageNotFound` when no record has this ID.
    async fn set_expired_flag(&self, id: &str) -> MetadataStorageResult<()>;

    /// Verifies that the store is reachable
    async fn check_connectivity(&self) -> MetadataStorageResult<()>;
}

/// Image metadata storage client for Dynamo DB operations
pub struct DynamoImageMetadataStore {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl DynamoImageMetadataStore {
    /// Creates a new image metadata storage client
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured Dynamo DB client
    /// * `table_name` - Dynamo DB table name for images
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    fn id_key(id: &str) -> (String, AttributeValue) {
        (
            ImageAttribute::Id.to_string(),
            AttributeValue::S(id.to_string()),
        )
    }

    /// Scans the whole table following `LastEvaluatedKey`
    ///
    /// With `expired_before` set, only items expired before that moment or
    /// already flagged are returned. Items that do not decode into an [`Image`]
    /// are logged and skipped.
    async fn scan_pages(
        &self,
        expired_before: Option<DateTime<Utc>>,
    ) -> MetadataStorageResult<Vec<Image>> {
        let mut images = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .dynamodb_client
                .scan()
                .table_name(&self.table_name)
                .consistent_read(true)
                .set_exclusive_start_key(start_key.take());

            if let Some(now) = expired_before {
                request = request
                    .filter_expression("#expires_at < :now OR #expired = :expired")
                    .expression_attribute_names("#expires_at", ImageAttribute::ExpiresAt.to_string())
                    .expression_attribute_names("#expired", ImageAttribute::IsExpiredFlag.to_string())
                    .expression_attribute_values(
                        ":now",
                        AttributeValue::N(unix_seconds::from_datetime(&now).to_string()),
                    )
                    .expression_attribute_values(":expired", AttributeValue::Bool(true));
            }

            let response = request.send().await?;

            for item in response.items.unwrap_or_default() {
                if let Some(image) = Self::decode_scanned(item) {
                    images.push(image);
                }
            }

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(images)
    }

    fn decode_scanned(item: HashMap<String, AttributeValue>) -> Option<Image> {
        let id = item
            .get(&ImageAttribute::Id.to_string())
            .and_then(|value| value.as_s().ok())
            .cloned()
            .unwrap_or_default();

        match serde_dynamo::from_item(item) {
            Ok(image) => Some(image),
            Err(e) => {
                counter!("image_records_undecodable").increment(1);
                warn!(image_id = %id, error = %e, "Skipping undecodable image record");
                None
            }
        }
    }
}

#[async_trait]
impl MetadataStore for DynamoImageMetadataStore {
    async fn put(&self, image: &Image) -> MetadataStorageResult<()> {
        let item = serde_dynamo::to_item(image)?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> MetadataStorageResult<Option<Image>> {
        let (key_name, key_value) = Self::id_key(id);

        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .consistent_read(true)
            .send()
            .await?;

        response
            .item
            .map(|item| serde_dynamo::from_item(item).map_err(MetadataStorageError::from))
            .transpose()
    }

    async fn delete_by_id(&self, id: &str) -> MetadataStorageResult<()> {
        let (key_name, key_value) = Self::id_key(id);

        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .send()
            .await?;

        Ok(())
    }

    async fn scan_expired_or_flagged(
        &self,
        now: DateTime<Utc>,
    ) -> MetadataStorageResult<Vec<Image>> {
        self.scan_pages(Some(now)).await
    }

    async fn scan_all(&self) -> MetadataStorageResult<Vec<Image>> {
        self.scan_pages(None).await
    }

    async fn set_expired_flag(&self, id: &str) -> MetadataStorageResult<()> {
        let (key_name, key_value) = Self::id_key(id);

        // The condition keeps UpdateItem from creating an item for an unknown ID
        self.dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .update_expression("SET #expired = :expired")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#expired", ImageAttribute::IsExpiredFlag.to_string())
            .expression_attribute_names("#pk", ImageAttribute::Id.to_string())
            .expression_attribute_values(":expired", AttributeValue::Bool(true))
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    MetadataStorageError::ImageNotFound(id.to_string())
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }

    async fn check_connectivity(&self) -> MetadataStorageResult<()> {
        self.dynamodb_client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await?;

        Ok(())
    }
}
