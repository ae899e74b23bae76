//! In-memory object and metadata stores
//!
//! Both stores keep per-key call counters and can be told to fail specific
//! operations, which lets tests observe exactly which adapter calls the
//! lifecycle engine issued.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::image::Image;
use crate::metadata::{MetadataStorageError, MetadataStorageResult, MetadataStore};
use crate::object::{ObjectStorageError, ObjectStorageResult, ObjectStore, PresignedUrls};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Default)]
struct ObjectState {
    objects: HashMap<String, Vec<u8>>,
    delete_calls: HashMap<String, usize>,
    fetch_calls: HashMap<String, usize>,
    presign_calls: usize,
    fail_presign: bool,
    fail_fetch: bool,
    fail_delete: bool,
}

/// Object store backed by a `HashMap`
#[derive(Default)]
pub struct InMemoryObjectStore {
    state: Mutex<ObjectState>,
}

impl InMemoryObjectStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an object, as an uploader using the presigned URL would
    pub fn put_object(&self, key: &str, bytes: &[u8]) {
        lock(&self.state)
            .objects
            .insert(key.to_string(), bytes.to_vec());
    }

    /// Removes an object without counting a delete call
    pub fn remove_object(&self, key: &str) {
        lock(&self.state).objects.remove(key);
    }

    /// Whether an object exists at `key`
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.state).objects.contains_key(key)
    }

    /// Number of delete attempts issued for `key`
    #[must_use]
    pub fn delete_calls(&self, key: &str) -> usize {
        lock(&self.state)
            .delete_calls
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Number of delete attempts across all keys
    #[must_use]
    pub fn total_delete_calls(&self) -> usize {
        lock(&self.state).delete_calls.values().sum()
    }

    /// Number of fetch attempts issued for `key`
    #[must_use]
    pub fn fetch_calls(&self, key: &str) -> usize {
        lock(&self.state)
            .fetch_calls
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Number of presigning requests
    #[must_use]
    pub fn presign_calls(&self) -> usize {
        lock(&self.state).presign_calls
    }

    /// Makes presigning fail
    pub fn fail_presign(&self, fail: bool) {
        lock(&self.state).fail_presign = fail;
    }

    /// Makes fetches fail
    pub fn fail_fetch(&self, fail: bool) {
        lock(&self.state).fail_fetch = fail;
    }

    /// Makes deletes fail
    pub fn fail_delete(&self, fail: bool) {
        lock(&self.state).fail_delete = fail;
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_upload_and_download_urls(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> ObjectStorageResult<PresignedUrls> {
        let mut state = lock(&self.state);
        state.presign_calls += 1;
        if state.fail_presign {
            return Err(ObjectStorageError::ConfigError(
                "presigning disabled".to_string(),
            ));
        }

        let secs = ttl.as_secs();
        Ok(PresignedUrls {
            upload_url: format!(
                "memory://images/{key}?op=put&content-type={content_type}&expires-in={secs}"
            ),
            download_url: format!("memory://images/{key}?op=get&expires-in={secs}"),
        })
    }

    async fn fetch_object(&self, key: &str) -> ObjectStorageResult<Option<Vec<u8>>> {
        let mut state = lock(&self.state);
        *state.fetch_calls.entry(key.to_string()).or_default() += 1;
        if state.fail_fetch {
            return Err(ObjectStorageError::UpstreamError(format!(
                "fetch of {key} failed"
            )));
        }
        Ok(state.objects.get(key).cloned())
    }

    async fn delete_object(&self, key: &str) -> ObjectStorageResult<()> {
        let mut state = lock(&self.state);
        *state.delete_calls.entry(key.to_string()).or_default() += 1;
        if state.fail_delete {
            return Err(ObjectStorageError::UpstreamError(format!(
                "delete of {key} failed"
            )));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn check_connectivity(&self) -> ObjectStorageResult<()> {
        if lock(&self.state).fail_fetch {
            return Err(ObjectStorageError::UpstreamError(
                "store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MetadataState {
    images: HashMap<String, Image>,
    flag_writes: HashMap<String, usize>,
    put_calls: usize,
    fail_put: bool,
    fail_get: bool,
    fail_scan: bool,
    fail_flag: bool,
}

/// Metadata store backed by a `HashMap`
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, bypassing the call counters
    pub fn insert(&self, image: Image) {
        lock(&self.state).images.insert(image.id.clone(), image);
    }

    /// Reads a record directly, bypassing the call counters and failure switches
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<Image> {
        lock(&self.state).images.get(id).cloned()
    }

    /// Moves a record's expiration to `expires_at`
    pub fn set_expires_at(&self, id: &str, expires_at: DateTime<Utc>) {
        if let Some(image) = lock(&self.state).images.get_mut(id) {
            image.expires_at = expires_at;
        }
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).images.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of flag writes issued for `id`
    #[must_use]
    pub fn flag_writes(&self, id: &str) -> usize {
        lock(&self.state)
            .flag_writes
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    /// Number of flag writes across all records
    #[must_use]
    pub fn total_flag_writes(&self) -> usize {
        lock(&self.state).flag_writes.values().sum()
    }

    /// Number of put calls
    #[must_use]
    pub fn put_calls(&self) -> usize {
        lock(&self.state).put_calls
    }

    /// Makes puts fail
    pub fn fail_put(&self, fail: bool) {
        lock(&self.state).fail_put = fail;
    }

    /// Makes point lookups fail
    pub fn fail_get(&self, fail: bool) {
        lock(&self.state).fail_get = fail;
    }

    /// Makes both scans fail
    pub fn fail_scan(&self, fail: bool) {
        lock(&self.state).fail_scan = fail;
    }

    /// Makes flag writes fail
    pub fn fail_flag(&self, fail: bool) {
        lock(&self.state).fail_flag = fail;
    }

    fn unavailable(operation: &str) -> MetadataStorageError {
        MetadataStorageError::Unavailable(format!("{operation} failed"))
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, image: &Image) -> MetadataStorageResult<()> {
        let mut state = lock(&self.state);
        state.put_calls += 1;
        if state.fail_put {
            return Err(Self::unavailable("put"));
        }
        // Stored through the item encoding so lossy formats show up in tests
        let item: serde_dynamo::Item = serde_dynamo::to_item(image)?;
        let stored: Image = serde_dynamo::from_item(item)?;
        state.images.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> MetadataStorageResult<Option<Image>> {
        let state = lock(&self.state);
        if state.fail_get {
            return Err(Self::unavailable("get"));
        }
        Ok(state.images.get(id).cloned())
    }

    async fn delete_by_id(&self, id: &str) -> MetadataStorageResult<()> {
        lock(&self.state).images.remove(id);
        Ok(())
    }

    async fn scan_expired_or_flagged(
        &self,
        now: DateTime<Utc>,
    ) -> MetadataStorageResult<Vec<Image>> {
        let state = lock(&self.state);
        if state.fail_scan {
            return Err(Self::unavailable("scan"));
        }
        // Same millisecond granularity as the DynamoDB filter
        let now_millis = now.timestamp_millis();
        Ok(state
            .images
            .values()
            .filter(|image| image.expires_at.timestamp_millis() < now_millis || image.is_expired_flag)
            .cloned()
            .collect())
    }

    async fn scan_all(&self) -> MetadataStorageResult<Vec<Image>> {
        let state = lock(&self.state);
        if state.fail_scan {
            return Err(Self::unavailable("scan"));
        }
        Ok(state.images.values().cloned().collect())
    }

    async fn set_expired_flag(&self, id: &str) -> MetadataStorageResult<()> {
        let mut state = lock(&self.state);
        *state.flag_writes.entry(id.to_string()).or_default() += 1;
        if state.fail_flag {
            return Err(Self::unavailable("update"));
        }
        match state.images.get_mut(id) {
            Some(image) => {
                image.is_expired_flag = true;
                Ok(())
            }
            None => Err(MetadataStorageError::ImageNotFound(id.to_string())),
        }
    }

    async fn check_connectivity(&self) -> MetadataStorageResult<()> {
        if lock(&self.state).fail_get {
            return Err(Self::unavailable("describe"));
        }
        Ok(())
    }
}
