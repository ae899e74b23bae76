//! Image record stored in the metadata table

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Prefix under which every image object is stored in the bucket
pub const IMAGE_KEY_PREFIX: &str = "images";

/// Attribute names for the images table
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ImageAttribute {
    /// Image ID (Primary Key)
    Id,
    /// Caller supplied display name
    OriginalName,
    /// Declared content type
    MimeType,
    /// Size in bytes
    Size,
    /// Object key in the bucket
    Path,
    /// Expiration as fractional unix seconds
    ExpiresAt,
    /// Creation timestamp (RFC 3339)
    CreatedAt,
    /// Read URL handed back to the uploader
    Url,
    /// Persisted expiration decision, never reset once true
    IsExpiredFlag,
}

/// A shared image
///
/// `expires_at` is persisted as fractional unix seconds so the table can filter
/// on it numerically; `created_at` is persisted as an RFC 3339 string. Both
/// keep millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Primary key (UUID v4)
    pub id: String,
    /// Display name as supplied by the uploader, not path safe
    pub original_name: String,
    /// Declared content type, trusted as-is
    pub mime_type: String,
    /// Size in bytes, `0` until known
    #[serde(default)]
    pub size: u64,
    /// Object key holding the binary content
    pub path: String,
    /// Moment after which the image is expired
    #[serde(with = "unix_seconds")]
    pub expires_at: DateTime<Utc>,
    /// Moment the upload intent was created
    pub created_at: DateTime<Utc>,
    /// Read URL handed back to the uploader
    #[serde(default)]
    pub url: String,
    /// Set once the image has been expired, never reset
    #[serde(default)]
    pub is_expired_flag: bool,
}

impl Image {
    /// Whether the image is expired at `now`, either by flag or by clock
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_flag || now > self.expires_at
    }

    /// Time left before expiration, zero once expired
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired_flag {
            return Duration::zero();
        }
        (self.expires_at - now).max(Duration::zero())
    }

    /// Public projection of the record (everything except the object key)
    #[must_use]
    pub fn to_public(&self) -> ImagePublic {
        ImagePublic {
            id: self.id.clone(),
            url: self.url.clone(),
            original_name: self.original_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

/// Image metadata as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePublic {
    /// Image ID
    pub id: String,
    /// Read URL for the image
    pub url: String,
    /// Display name as supplied by the uploader
    pub original_name: String,
    /// Declared content type
    pub mime_type: String,
    /// Size in bytes, `0` when unknown
    pub size: u64,
    /// ISO-8601 UTC timestamp when the image expires
    pub expires_at: DateTime<Utc>,
    /// ISO-8601 UTC timestamp when the image was created
    pub created_at: DateTime<Utc>,
}

/// Serde helpers storing a timestamp as fractional unix seconds with millisecond precision
///
/// Integer seconds written by older records are accepted as well.
pub mod unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Fractional unix seconds of `at`, truncated to milliseconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_datetime(at: &DateTime<Utc>) -> f64 {
        // Millisecond timestamps stay well inside f64's exact integer range
        at.timestamp_millis() as f64 / 1000.0
    }

    /// Timestamp for fractional unix seconds, rounded to the nearest millisecond
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_datetime(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
    }

    /// Serializes `at` as fractional unix seconds
    ///
    /// # Errors
    ///
    /// Returns the serializer's error
    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(from_datetime(at))
    }

    /// Deserializes fractional or integer unix seconds
    ///
    /// # Errors
    ///
    /// Fails when the value is not a number or is outside the supported range
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        to_datetime(secs).ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds the object key for an image from its ID and display name
#[must_use]
pub fn object_key(id: &str, display_name: &str) -> String {
    format!(
        "{IMAGE_KEY_PREFIX}/{id}-{}",
        sanitize_file_name(display_name)
    )
}
