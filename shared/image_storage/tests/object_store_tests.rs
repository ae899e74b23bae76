mod common;

use std::time::Duration;

use common::TestBucket;
use image_storage::object::{ObjectStore, S3ObjectStore};
use pretty_assertions::assert_eq;

fn store(bucket: &TestBucket) -> S3ObjectStore {
    S3ObjectStore::new(bucket.client.clone(), bucket.bucket_name.clone())
}

#[tokio::test]
async fn test_presigned_upload_then_fetch() {
    let bucket = TestBucket::new().await;
    let store = store(&bucket);
    let key = "images/abc-cat.png";

    let urls = store
        .create_upload_and_download_urls(key, "image/png", Duration::from_secs(300))
        .await
        .unwrap();

    assert!(urls.upload_url.contains(key));
    assert!(urls.download_url.contains(key));

    let response = reqwest::Client::new()
        .put(&urls.upload_url)
        .header("Content-Type", "image/png")
        .body(b"png bytes".to_vec())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let bytes = store.fetch_object(key).await.unwrap();
    assert_eq!(bytes, Some(b"png bytes".to_vec()));

    let downloaded = reqwest::get(&urls.download_url)
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(downloaded.as_ref(), b"png bytes");
}

#[tokio::test]
async fn test_fetch_missing_object_returns_none() {
    let bucket = TestBucket::new().await;

    assert_eq!(store(&bucket).fetch_object("images/missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let bucket = TestBucket::new().await;
    let store = store(&bucket);
    let key = "images/def-dog.jpg";
    bucket
        .client
        .put_object()
        .bucket(&bucket.bucket_name)
        .key(key)
        .body(b"jpeg".to_vec().into())
        .send()
        .await
        .unwrap();

    store.delete_object(key).await.unwrap();
    store.delete_object(key).await.unwrap();

    assert_eq!(store.fetch_object(key).await.unwrap(), None);
}

#[tokio::test]
async fn test_presigning_rejects_ttl_over_seven_days() {
    let bucket = TestBucket::new().await;

    let result = store(&bucket)
        .create_upload_and_download_urls(
            "images/long",
            "image/png",
            Duration::from_secs(8 * 24 * 60 * 60),
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_check_connectivity() {
    let bucket = TestBucket::new().await;
    store(&bucket).check_connectivity().await.unwrap();

    let missing = S3ObjectStore::new(bucket.client.clone(), "no-such-bucket-for-tests".to_string());
    assert!(missing.check_connectivity().await.is_err());
}
