//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};

const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Returns the S3 bucket name for the environment
    ///
    /// # Panics
    ///
    /// Panics if the `S3_BUCKET_NAME` environment variable is not set outside development
    #[must_use]
    pub fn s3_bucket(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("S3_BUCKET_NAME").expect("S3_BUCKET_NAME environment variable is not set")
            }
            Self::Development => {
                env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "shared-images".to_string())
            }
        }
    }

    /// Returns the `DynamoDB` table holding image metadata
    ///
    /// # Panics
    ///
    /// Panics if the `DYNAMODB_TABLE_NAME` environment variable is not set outside development
    #[must_use]
    pub fn dynamodb_table_name(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("DYNAMODB_TABLE_NAME")
                .expect("DYNAMODB_TABLE_NAME environment variable is not set"),
            Self::Development => env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| "shared-images-metadata".to_string()),
        }
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Staging)
    }

    /// Returns the endpoint URL to use for AWS services
    ///
    /// `AWS_ENDPOINT_URL` replaces the `LocalStack` default in development.
    #[must_use]
    pub fn override_aws_endpoint_url(&self) -> Option<String> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            Self::Development => Some(
                env::var("AWS_ENDPOINT_URL").unwrap_or_else(|_| LOCALSTACK_ENDPOINT.to_string()),
            ),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS S3 service configuration
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self, Self::Development) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }

    /// Port the HTTP server listens on, from `PORT` (default 8000)
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number
    pub fn port(&self) -> Result<u16, std::num::ParseIntError> {
        env::var("PORT").map_or(Ok(8000), |p| p.parse())
    }

    /// Allowed CORS origins from the comma separated `CORS_ALLOWED_ORIGINS`
    ///
    /// `None` means any origin, which is only the case in development when the
    /// variable is unset. Elsewhere an unset variable allows no cross-origin calls.
    #[must_use]
    pub fn cors_allowed_origins(&self) -> Option<Vec<String>> {
        match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(value) => Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            ),
            Err(_) => match self {
                Self::Production | Self::Staging => Some(Vec::new()),
                Self::Development => None,
            },
        }
    }

    /// Interval of the in-process expiration sweep, from `EXPIRATION_SWEEP_INTERVAL_SECS`
    ///
    /// Unset or zero disables the in-process sweep. An unparsable value also
    /// disables it, with a warning.
    #[must_use]
    pub fn expiration_sweep_interval(&self) -> Option<Duration> {
        let value = env::var("EXPIRATION_SWEEP_INTERVAL_SECS").ok()?;
        match value.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                tracing::warn!(
                    value = %value,
                    error = %e,
                    "Ignoring invalid EXPIRATION_SWEEP_INTERVAL_SECS, in-process sweep disabled"
                );
                None
            }
        }
    }
}
