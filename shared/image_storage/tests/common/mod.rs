// Not every helper is used in every test, so we allow dead code
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use image_storage::image::{Image, ImageAttribute};
use uuid::Uuid;

/// Test configuration for LocalStack
pub const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";
pub const TEST_REGION: &str = "us-east-1";

/// Loads an AWS config pointing at LocalStack
pub async fn localstack_config() -> aws_config::SdkConfig {
    let credentials = Credentials::from_keys(
        "test", // AWS_ACCESS_KEY_ID
        "test", // AWS_SECRET_ACCESS_KEY
        None,   // no session token
    );
    aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(LOCALSTACK_ENDPOINT)
        .region(Region::new(TEST_REGION))
        .credentials_provider(credentials)
        .load()
        .await
}

/// Unique images table, deleted on drop
pub struct TestTable {
    pub client: Arc<DynamoDbClient>,
    pub table_name: String,
}

impl TestTable {
    pub async fn new() -> Self {
        let table_name = format!("test-images-{}", Uuid::new_v4());
        let client = Arc::new(DynamoDbClient::new(&localstack_config().await));

        client
            .create_table()
            .table_name(&table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ImageAttribute::Id.to_string())
                    .key_type(KeyType::Hash)
                    .build()
                    .expect("Failed to build key schema"),
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ImageAttribute::Id.to_string())
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .expect("Failed to build attribute definition"),
            )
            .send()
            .await
            .expect("Failed to create test table");

        // Wait for table to be ready
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self { client, table_name }
    }
}

impl Drop for TestTable {
    fn drop(&mut self) {
        let client = self.client.clone();
        let table = self.table_name.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = client.delete_table().table_name(&table).send().await;
            });
        }
    }
}

/// Unique bucket, emptied and deleted on drop
pub struct TestBucket {
    pub client: Arc<S3Client>,
    pub bucket_name: String,
}

impl TestBucket {
    pub async fn new() -> Self {
        let bucket_name = format!("test-images-{}", Uuid::new_v4().simple());
        let config = aws_sdk_s3::config::Builder::from(&localstack_config().await)
            .force_path_style(true)
            .build();
        let client = Arc::new(S3Client::from_conf(config));

        client
            .create_bucket()
            .bucket(&bucket_name)
            .send()
            .await
            .expect("Failed to create test bucket");

        Self {
            client,
            bucket_name,
        }
    }
}

impl Drop for TestBucket {
    fn drop(&mut self) {
        let client = self.client.clone();
        let bucket = self.bucket_name.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Ok(listing) = client.list_objects_v2().bucket(&bucket).send().await {
                    for object in listing.contents() {
                        if let Some(key) = object.key() {
                            let _ = client.delete_object().bucket(&bucket).key(key).send().await;
                        }
                    }
                }
                let _ = client.delete_bucket().bucket(&bucket).send().await;
            });
        }
    }
}

/// Builds an image record with the given expiry
pub fn test_image(expires_at: DateTime<Utc>, flagged: bool) -> Image {
    let id = Uuid::new_v4().to_string();
    Image {
        path: format!("images/{id}-test.png"),
        id,
        original_name: "test.png".to_string(),
        mime_type: "image/png".to_string(),
        size: 0,
        expires_at,
        created_at: Utc::now() - chrono::Duration::minutes(1),
        url: "http://localhost:4566/images/test.png".to_string(),
        is_expired_flag: flagged,
    }
}
