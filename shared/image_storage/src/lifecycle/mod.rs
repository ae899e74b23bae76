//! Image lifecycle: upload intents, reads with expiration checks, and the expiration sweep
//!
//! An image moves from active to expired exactly once, by flipping
//! `isExpiredFlag` and then deleting the backing object. The transition is
//! idempotent and the two steps are attempted independently, so any number of
//! sweeps and reactive purges may run at the same time without coordination.
//! The worst overlap produces a redundant delete of an already absent object.

mod error;
mod sweeper;

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use futures::{stream, StreamExt};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

pub use error::{LifecycleError, LifecycleResult};
pub use sweeper::ExpirationSweeper;

use crate::image::{object_key, Image, ImagePublic};
use crate::metadata::MetadataStore;
use crate::object::ObjectStore;

/// Number of expire-and-purge transitions a sweep runs at the same time
pub const SWEEP_CONCURRENCY: usize = 8;

/// Result of creating an upload intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadIntent {
    /// Image ID
    pub id: String,
    /// Presigned PUT URL, used once by the uploader to place the content
    pub upload_url: String,
    /// Read URL for the image
    pub url: String,
    /// Moment the image expires
    pub expires_at: DateTime<Utc>,
    /// Moment the intent was created
    pub created_at: DateTime<Utc>,
    /// Display name as supplied
    pub original_name: String,
    /// Declared content type
    pub mime_type: String,
    /// Size in bytes, always `0` at creation
    pub size: u64,
}

/// Image bytes with their declared content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    /// Declared content type
    pub mime_type: String,
    /// Raw object bytes
    pub bytes: Vec<u8>,
}

/// What happened to the expired flag during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagUpdate {
    /// The record was already flagged, nothing was written
    AlreadySet,
    /// The flag was written
    Written,
    /// The flag write failed
    Failed,
}

/// What happened to the backing object during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPurge {
    /// The delete request succeeded (the object may already have been gone)
    Deleted,
    /// The record has no object key
    Skipped,
    /// The delete request failed
    Failed,
}

/// Outcome of one expire-and-purge transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Flag step
    pub flag: FlagUpdate,
    /// Object step
    pub object: ObjectPurge,
}

/// Summary of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Records returned by the expired-or-flagged scan
    pub flagged_candidates: usize,
    /// Unflagged records found expired by the client-side time check
    pub time_expired_candidates: usize,
    /// Transitions attempted
    pub transitions: usize,
    /// Flags newly written
    pub flags_written: usize,
    /// Flag writes that failed
    pub flag_failures: usize,
    /// Object deletes that failed
    pub delete_failures: usize,
    /// Scans that failed
    pub scan_failures: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: PurgeOutcome) {
        self.transitions += 1;
        match outcome.flag {
            FlagUpdate::Written => self.flags_written += 1,
            FlagUpdate::Failed => self.flag_failures += 1,
            FlagUpdate::AlreadySet => {}
        }
        if outcome.object == ObjectPurge::Failed {
            self.delete_failures += 1;
        }
    }

    /// Whether any scan, flag write or delete failed
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.flag_failures > 0 || self.delete_failures > 0 || self.scan_failures > 0
    }
}

/// Orchestrates image creation, reads, and expiration
#[derive(Clone)]
pub struct ImageLifecycle {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
}

impl ImageLifecycle {
    /// Creates a lifecycle engine over the given stores
    #[must_use]
    pub fn new(metadata: Arc<dyn MetadataStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { metadata, objects }
    }

    /// Creates an upload intent: presigned URLs plus an active image record
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Validation` for an empty display name or content
    /// type, or a non-positive TTL. Store failures are propagated unchanged; no
    /// record is written when presigning fails.
    #[instrument(skip(self, display_name, content_type), fields(ttl_secs = ttl.num_seconds()))]
    pub async fn initiate_upload(
        &self,
        display_name: &str,
        content_type: &str,
        ttl: Duration,
    ) -> LifecycleResult<UploadIntent> {
        if display_name.is_empty() {
            return Err(LifecycleError::Validation(
                "file name is required".to_string(),
            ));
        }
        if content_type.is_empty() {
            return Err(LifecycleError::Validation(
                "content type is required".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(LifecycleError::Validation(
                "expiration must be positive".to_string(),
            ));
        }
        let presign_ttl = ttl
            .to_std()
            .map_err(|e| LifecycleError::Validation(format!("invalid expiration: {e}")))?;

        // Millisecond precision is what the metadata store keeps
        let created_at = Utc::now().trunc_subsecs(3);
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| LifecycleError::Validation("expiration out of range".to_string()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let path = object_key(&id, display_name);

        let urls = self
            .objects
            .create_upload_and_download_urls(&path, content_type, presign_ttl)
            .await
            .inspect_err(|e| error!(image_id = %id, key = %path, error = %e, "Failed to presign image URLs"))?;

        let image = Image {
            id: id.clone(),
            original_name: display_name.to_string(),
            mime_type: content_type.to_string(),
            size: 0,
            path,
            expires_at,
            created_at,
            url: urls.download_url,
            is_expired_flag: false,
        };

        self.metadata
            .put(&image)
            .await
            .inspect_err(|e| error!(image_id = %id, error = %e, "Failed to save image metadata"))?;

        counter!("images_created").increment(1);
        info!(image_id = %id, expires_at = %expires_at, "Created upload intent");

        Ok(UploadIntent {
            id,
            upload_url: urls.upload_url,
            url: image.url,
            expires_at,
            created_at,
            original_name: image.original_name,
            mime_type: image.mime_type,
            size: image.size,
        })
    }

    /// Returns the public metadata of an active image
    ///
    /// Never mutates anything; an expired image is reported as `None` without
    /// being flagged or purged.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::MetadataStorage` if the lookup fails
    #[instrument(skip(self))]
    pub async fn fetch_metadata(&self, id: &str) -> LifecycleResult<Option<ImagePublic>> {
        let image = self
            .metadata
            .get_by_id(id)
            .await
            .inspect_err(|e| error!(image_id = %id, error = %e, "Failed to load image metadata"))?;

        let now = Utc::now();
        Ok(image
            .filter(|image| !image.is_expired_at(now))
            .map(|image| image.to_public()))
    }

    /// Returns the content of an active image
    ///
    /// An expired image goes through [`Self::expire_and_purge`] before `None` is
    /// returned. A missing object on an active image is reported as `None`
    /// without touching the flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata lookup or the object read fails
    #[instrument(skip(self))]
    pub async fn fetch_content(&self, id: &str) -> LifecycleResult<Option<ImageContent>> {
        let image = self
            .metadata
            .get_by_id(id)
            .await
            .inspect_err(|e| error!(image_id = %id, error = %e, "Failed to load image metadata"))?;

        let Some(image) = image else {
            debug!(image_id = %id, "Image not found");
            return Ok(None);
        };

        if image.is_expired_at(Utc::now()) {
            info!(image_id = %id, "Image has expired");
            self.expire_and_purge(&image).await;
            return Ok(None);
        }

        match self.objects.fetch_object(&image.path).await {
            Ok(Some(bytes)) => Ok(Some(ImageContent {
                mime_type: image.mime_type,
                bytes,
            })),
            Ok(None) => {
                warn!(image_id = %id, key = %image.path, "Image object missing for active record");
                Ok(None)
            }
            Err(e) => {
                error!(image_id = %id, key = %image.path, error = %e, "Failed to read image object");
                Err(e.into())
            }
        }
    }

    /// Marks the image expired, then deletes its object
    ///
    /// The flag is written first so that a crash between the two steps leaves
    /// the record marked. Each step is attempted regardless of the other's
    /// result and failures are only logged. The metadata record is kept.
    #[instrument(skip(self, image), fields(image_id = %image.id))]
    pub async fn expire_and_purge(&self, image: &Image) -> PurgeOutcome {
        let flag = if image.is_expired_flag {
            FlagUpdate::AlreadySet
        } else {
            match self.metadata.set_expired_flag(&image.id).await {
                Ok(()) => {
                    counter!("images_expired").increment(1);
                    FlagUpdate::Written
                }
                Err(e) => {
                    error!(image_id = %image.id, error = %e, "Failed to mark image as expired");
                    FlagUpdate::Failed
                }
            }
        };

        let object = if image.path.is_empty() {
            debug!(image_id = %image.id, "Skipping object deletion, no key recorded");
            ObjectPurge::Skipped
        } else {
            match self.objects.delete_object(&image.path).await {
                Ok(()) => {
                    counter!("image_objects_purged").increment(1);
                    ObjectPurge::Deleted
                }
                Err(e) => {
                    counter!("image_purge_failures").increment(1);
                    error!(image_id = %image.id, key = %image.path, error = %e, "Failed to delete image object");
                    ObjectPurge::Failed
                }
            }
        };

        info!(image_id = %image.id, ?flag, ?object, "Expired image");
        PurgeOutcome { flag, object }
    }

    /// Finds every expirable image and runs the transition on each
    ///
    /// Pass one takes the store's expired-or-flagged scan. Pass two re-checks
    /// the full table on the client side for unflagged records whose expiry has
    /// passed. Failures are counted in the report and never stop the sweep.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.metadata.scan_expired_or_flagged(Utc::now()).await {
            Ok(candidates) => {
                report.flagged_candidates = candidates.len();
                self.purge_all(&candidates, &mut report).await;
            }
            Err(e) => {
                error!(error = %e, "Failed to scan expired or flagged images");
                report.scan_failures += 1;
            }
        }

        match self.metadata.scan_all().await {
            Ok(images) => {
                let now = Utc::now();
                let candidates: Vec<Image> = images
                    .into_iter()
                    .filter(|image| !image.is_expired_flag && image.expires_at < now)
                    .collect();
                report.time_expired_candidates = candidates.len();
                self.purge_all(&candidates, &mut report).await;
            }
            Err(e) => {
                error!(error = %e, "Failed to scan all images");
                report.scan_failures += 1;
            }
        }

        if report.has_failures() {
            warn!(?report, "Expiration sweep finished with failures");
        } else {
            info!(?report, "Expiration sweep finished");
        }
        report
    }

    async fn purge_all(&self, candidates: &[Image], report: &mut SweepReport) {
        let purges: Vec<_> = candidates
            .iter()
            .map(|image| self.expire_and_purge(image))
            .collect();
        let outcomes: Vec<PurgeOutcome> = stream::iter(purges)
            .buffer_unordered(SWEEP_CONCURRENCY)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
    }
}
