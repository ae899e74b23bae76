use std::sync::Arc;

use axum::{
    extract::Path,
    http::{header, HeaderValue},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use image_storage::{
    image::ImagePublic,
    lifecycle::{ImageLifecycle, UploadIntent},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::types::{AppError, ValidatedJson};

/// Lifetime of an image when the request does not set one
pub const DEFAULT_EXPIRATION_MINUTES: i64 = 60;

const fn default_expiration_minutes() -> i64 {
    DEFAULT_EXPIRATION_MINUTES
}

/// Request to create an upload intent
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageRequest {
    /// Display name of the file, kept verbatim in the metadata
    #[validate(length(min = 1, max = 1024, message = "fileName must not be empty"))]
    pub file_name: String,

    /// Declared content type, served back with the image
    #[validate(length(min = 1, max = 255, message = "contentType must not be empty"))]
    pub content_type: String,

    /// Minutes until the image expires
    #[serde(default = "default_expiration_minutes")]
    #[validate(range(min = 1, message = "expirationMinutes must be a positive integer"))]
    #[schemars(description = "Minutes until the image expires (default 60)")]
    pub expiration_minutes: i64,
}

/// Response for a created upload intent
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageResponse {
    /// Image ID
    pub id: String,
    /// Presigned PUT URL to upload the content to
    pub upload_url: String,
    /// Read URL for the image
    pub url: String,
    /// When the image expires
    pub expires_at: DateTime<Utc>,
    /// Display name as supplied
    pub original_name: String,
    /// Declared content type
    pub mime_type: String,
    /// Size in bytes, `0` until known
    pub size: u64,
    /// When the upload intent was created
    pub created_at: DateTime<Utc>,
}

impl From<UploadIntent> for CreateImageResponse {
    fn from(intent: UploadIntent) -> Self {
        Self {
            id: intent.id,
            upload_url: intent.upload_url,
            url: intent.url,
            expires_at: intent.expires_at,
            original_name: intent.original_name,
            mime_type: intent.mime_type,
            size: intent.size,
            created_at: intent.created_at,
        }
    }
}

/// Create an upload intent
///
/// Returns presigned upload and read URLs for a new image together with its
/// metadata. The content is uploaded directly to the object store with a `PUT`
/// to `uploadUrl`.
///
/// # Errors
///
/// Returns an error if:
/// - `400 BAD_REQUEST` - Missing fields or a non-positive expiration
/// - `500 INTERNAL_SERVER_ERROR` - Presigning or saving the metadata failed
#[instrument(skip(lifecycle, payload))]
pub async fn create_image(
    Extension(lifecycle): Extension<Arc<ImageLifecycle>>,
    ValidatedJson(payload): ValidatedJson<CreateImageRequest>,
) -> Result<Json<CreateImageResponse>, AppError> {
    let ttl = Duration::try_minutes(payload.expiration_minutes)
        .ok_or_else(|| AppError::validation("expirationMinutes is too large"))?;

    let intent = lifecycle
        .initiate_upload(&payload.file_name, &payload.content_type, ttl)
        .await?;

    Ok(Json(intent.into()))
}

/// Get image content
///
/// Returns the raw image bytes with the content type declared at upload.
/// Reading an expired image removes its content.
///
/// # Errors
///
/// Returns `404 NOT_FOUND` when the image is unknown, expired or has no content
#[instrument(skip(lifecycle))]
pub async fn get_image(
    Path(image_id): Path<String>,
    Extension(lifecycle): Extension<Arc<ImageLifecycle>>,
) -> Result<([(header::HeaderName, HeaderValue); 1], Vec<u8>), AppError> {
    // Storage failures are logged by the lifecycle and reported as not found
    let content = lifecycle
        .fetch_content(&image_id)
        .await
        .ok()
        .flatten()
        .ok_or_else(AppError::image_not_found)?;

    let content_type = HeaderValue::from_str(&content.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok(([(header::CONTENT_TYPE, content_type)], content.bytes))
}

/// Get image metadata
///
/// Returns the public metadata of an active image.
///
/// # Errors
///
/// Returns `404 NOT_FOUND` when the image is unknown or expired
#[instrument(skip(lifecycle))]
pub async fn get_image_metadata(
    Path(image_id): Path<String>,
    Extension(lifecycle): Extension<Arc<ImageLifecycle>>,
) -> Result<Json<ImagePublic>, AppError> {
    lifecycle
        .fetch_metadata(&image_id)
        .await
        .ok()
        .flatten()
        .map(Json)
        .ok_or_else(AppError::image_not_found)
}
