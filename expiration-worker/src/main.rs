use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use clap::Parser;
use datadog_tracing::axum::shutdown_signal;
use expiration_worker::{cli::Args, types::Environment, worker};
use image_storage::{
    lifecycle::ImageLifecycle, metadata::DynamoImageMetadataStore, object::S3ObjectStore,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::from_env();

    match env {
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

    info!("Starting Expiration Worker in {:?} environment", env);

    let s3_client = Arc::new(S3Client::from_conf(env.s3_client_config().await));
    let dynamodb_client = Arc::new(DynamoDbClient::new(&env.aws_config().await));
    let lifecycle = ImageLifecycle::new(
        Arc::new(DynamoImageMetadataStore::new(
            dynamodb_client,
            env.dynamodb_table_name(),
        )),
        Arc::new(S3ObjectStore::new(s3_client, env.s3_bucket())),
    );

    if args.once {
        worker::run_once(&lifecycle).await;
        return Ok(());
    }

    // Single shutdown token for everything
    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down Expiration Worker...");
        signal_token.cancel();
    });

    worker::run_loop(lifecycle, args.interval(), env.health_port()?, shutdown_token).await?;

    info!("Expiration Worker stopped");
    Ok(())
}
