use std::sync::Arc;

use aide::axum::IntoApiResponse;
use axum::{http::StatusCode, Extension, Json};
use image_storage::{metadata::MetadataStore, object::ObjectStore};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::error;

/// Liveness response
#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    /// `ok` when the service is up
    status: String,
    /// Current version of the application
    semver: String,
    /// Commit hash of the current build (if available)
    rev: Option<String>,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            semver: env!("CARGO_PKG_VERSION").to_string(),
            rev: option_env!("GIT_REV").map(ToString::to_string),
        }
    }
}

/// Health check endpoint
///
/// Returns the current status and version information of the service.
/// This endpoint can be used for monitoring and deployment verification.
pub async fn handler() -> impl IntoApiResponse {
    Json(HealthResponse::new("ok"))
}

/// Reachability of a single dependency
#[derive(Debug, Serialize, JsonSchema, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    /// The dependency answered
    Ok,
    /// The dependency failed to answer
    Error,
}

/// Dependency health response
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeepHealthResponse {
    #[serde(flatten)]
    health: HealthResponse,
    /// Image object store
    object_store: DependencyStatus,
    /// Image metadata store
    metadata_store: DependencyStatus,
}

/// Deep health check endpoint
///
/// Probes the object store and the metadata store. Responds `503` if either
/// one is unreachable.
pub async fn deep_handler(
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
    Extension(metadata_store): Extension<Arc<dyn MetadataStore>>,
) -> impl IntoApiResponse {
    let (objects, metadata) = tokio::join!(
        object_store.check_connectivity(),
        metadata_store.check_connectivity()
    );

    let object_store = objects.map_or_else(
        |e| {
            error!("Object store health check failed: {e}");
            DependencyStatus::Error
        },
        |()| DependencyStatus::Ok,
    );
    let metadata_store = metadata.map_or_else(
        |e| {
            error!("Metadata store health check failed: {e}");
            DependencyStatus::Error
        },
        |()| DependencyStatus::Ok,
    );

    let healthy = object_store == DependencyStatus::Ok && metadata_store == DependencyStatus::Ok;
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(DeepHealthResponse {
            health: HealthResponse::new(label),
            object_store,
            metadata_store,
        }),
    )
}
