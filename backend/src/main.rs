use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use backend::{server, types::Environment};
use image_storage::{
    lifecycle::{ExpirationSweeper, ImageLifecycle},
    metadata::{DynamoImageMetadataStore, MetadataStore},
    object::{ObjectStore, S3ObjectStore},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    // Configure logging format based on environment
    // Use JSON format for staging/production (Datadog), regular format for development
    match environment {
        Environment::Production | Environment::Staging => {
            fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
        }
        Environment::Development => {
            fmt().with_env_filter(EnvFilter::from_default_env()).init();
        }
    }

    let s3_client = Arc::new(S3Client::from_conf(environment.s3_client_config().await));
    let dynamodb_client = Arc::new(DynamoDbClient::new(&environment.aws_config().await));

    let object_store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::new(s3_client, environment.s3_bucket()));
    let metadata_store: Arc<dyn MetadataStore> = Arc::new(DynamoImageMetadataStore::new(
        dynamodb_client,
        environment.dynamodb_table_name(),
    ));
    let lifecycle = Arc::new(ImageLifecycle::new(
        metadata_store.clone(),
        object_store.clone(),
    ));

    // Optional in-process expiration sweep
    let shutdown_token = CancellationToken::new();
    let sweeper = environment.expiration_sweep_interval().map(|interval| {
        info!("Running expiration sweep every {}s", interval.as_secs());
        tokio::spawn(
            ExpirationSweeper::new((*lifecycle).clone(), interval, shutdown_token.clone()).run(),
        )
    });

    let result = server::start(environment, lifecycle, object_store, metadata_store).await;

    shutdown_token.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!("Expiration sweeper task failed: {e}");
        }
    }

    result
}
