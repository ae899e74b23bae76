mod common;

use std::sync::Arc;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use common::{test_image, TestTable};
use image_storage::image::{unix_seconds, ImageAttribute};
use image_storage::lifecycle::ImageLifecycle;
use image_storage::memory::InMemoryObjectStore;
use image_storage::metadata::{DynamoImageMetadataStore, MetadataStorageError, MetadataStore};
use pretty_assertions::assert_eq;

/// Millisecond precision, the precision the table keeps
fn millis_from_now(offset: Duration) -> DateTime<Utc> {
    (Utc::now() + offset).trunc_subsecs(3)
}

fn store(table: &TestTable) -> DynamoImageMetadataStore {
    DynamoImageMetadataStore::new(table.client.clone(), table.table_name.clone())
}

#[tokio::test]
async fn test_put_and_get_round_trip() {
    let table = TestTable::new().await;
    let store = store(&table);
    let image = test_image(millis_from_now(Duration::minutes(10)), false);

    store.put(&image).await.unwrap();
    let loaded = store.get_by_id(&image.id).await.unwrap();

    assert_eq!(loaded, Some(image));
}

#[tokio::test]
async fn test_sub_second_expiry_round_trip() {
    let table = TestTable::new().await;
    let store = store(&table);
    let created_at = DateTime::from_timestamp_millis(1_700_000_000_709).unwrap();
    let mut image = test_image(created_at + Duration::minutes(1), false);
    image.created_at = created_at;

    store.put(&image).await.unwrap();
    let loaded = store.get_by_id(&image.id).await.unwrap().unwrap();

    assert_eq!(loaded.expires_at, image.expires_at);
    assert_eq!(loaded.expires_at, loaded.created_at + Duration::minutes(1));
}

#[tokio::test]
async fn test_scan_reads_fractional_expiry_items() {
    let table = TestTable::new().await;
    let store = store(&table);
    let id = "fractional-expiry";

    table
        .client
        .put_item()
        .table_name(&table.table_name)
        .item("id", AttributeValue::S(id.to_string()))
        .item("originalName", AttributeValue::S("old.png".to_string()))
        .item("mimeType", AttributeValue::S("image/png".to_string()))
        .item("size", AttributeValue::N("0".to_string()))
        .item("path", AttributeValue::S(format!("images/{id}-old.png")))
        .item("expiresAt", AttributeValue::N("1700000000.5".to_string()))
        .item("createdAt", AttributeValue::S("2023-11-14T21:13:20.500Z".to_string()))
        .item("url", AttributeValue::S(String::new()))
        .item("isExpiredFlag", AttributeValue::Bool(false))
        .send()
        .await
        .unwrap();

    let found = store.scan_expired_or_flagged(Utc::now()).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);
    assert_eq!(found[0].expires_at.timestamp_millis(), 1_700_000_000_500);
}

#[tokio::test]
async fn test_sweep_skips_undecodable_item_and_expires_the_rest() {
    let table = TestTable::new().await;
    let metadata = Arc::new(store(&table));
    let objects = Arc::new(InMemoryObjectStore::new());

    // Flagged so both scans return it, but without a path it cannot decode
    table
        .client
        .put_item()
        .table_name(&table.table_name)
        .item("id", AttributeValue::S("broken".to_string()))
        .item("expiresAt", AttributeValue::S("yesterday".to_string()))
        .item("isExpiredFlag", AttributeValue::Bool(true))
        .send()
        .await
        .unwrap();

    let expired = test_image(millis_from_now(Duration::minutes(-5)), false);
    metadata.put(&expired).await.unwrap();
    objects.put_object(&expired.path, b"bytes");

    let lifecycle = ImageLifecycle::new(metadata.clone(), objects.clone());
    let report = lifecycle.sweep_expired().await;

    assert_eq!(report.scan_failures, 0);
    assert_eq!(report.flags_written, 1);
    let loaded = metadata.get_by_id(&expired.id).await.unwrap().unwrap();
    assert!(loaded.is_expired_flag);
    assert!(!objects.contains(&expired.path));
}

#[tokio::test]
async fn test_item_uses_camel_case_attributes() {
    let table = TestTable::new().await;
    let store = store(&table);
    let image = test_image(millis_from_now(Duration::minutes(10)), false);
    store.put(&image).await.unwrap();

    let item = table
        .client
        .get_item()
        .table_name(&table.table_name)
        .key(
            ImageAttribute::Id.to_string(),
            AttributeValue::S(image.id.clone()),
        )
        .send()
        .await
        .unwrap()
        .item
        .unwrap();

    assert_eq!(
        item.get("expiresAt").unwrap().as_n().unwrap(),
        &unix_seconds::from_datetime(&image.expires_at).to_string()
    );
    assert_eq!(item.get("isExpiredFlag").unwrap().as_bool().unwrap(), &false);
    assert!(item.get("originalName").is_some());
    assert!(item.get("mimeType").is_some());
    assert!(item.get("createdAt").unwrap().as_s().is_ok());
}

#[tokio::test]
async fn test_get_unknown_id_returns_none() {
    let table = TestTable::new().await;
    let store = store(&table);

    assert_eq!(store.get_by_id("does-not-exist").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_expired_flag() {
    let table = TestTable::new().await;
    let store = store(&table);
    let image = test_image(millis_from_now(Duration::minutes(10)), false);
    store.put(&image).await.unwrap();

    store.set_expired_flag(&image.id).await.unwrap();
    // Setting it again is harmless
    store.set_expired_flag(&image.id).await.unwrap();

    let loaded = store.get_by_id(&image.id).await.unwrap().unwrap();
    assert!(loaded.is_expired_flag);
    assert_eq!(loaded.expires_at, image.expires_at);
}

#[tokio::test]
async fn test_set_expired_flag_on_unknown_id_creates_nothing() {
    let table = TestTable::new().await;
    let store = store(&table);

    let result = store.set_expired_flag("ghost").await;

    assert!(matches!(result, Err(MetadataStorageError::ImageNotFound(id)) if id == "ghost"));
    assert_eq!(store.get_by_id("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn test_scan_expired_or_flagged() {
    let table = TestTable::new().await;
    let store = store(&table);
    let expired = test_image(millis_from_now(Duration::minutes(-5)), false);
    let flagged = test_image(millis_from_now(Duration::minutes(5)), true);
    let active = test_image(millis_from_now(Duration::minutes(5)), false);
    for image in [&expired, &flagged, &active] {
        store.put(image).await.unwrap();
    }

    let mut ids: Vec<String> = store
        .scan_expired_or_flagged(Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|image| image.id)
        .collect();
    ids.sort();

    let mut expected = vec![expired.id, flagged.id];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_scan_all_follows_pagination() {
    let table = TestTable::new().await;
    let store = store(&table);

    // Large enough names to push the table past one 1 MB scan page
    let padding = "x".repeat(300_000);
    let mut ids = Vec::new();
    for _ in 0..5 {
        let mut image = test_image(millis_from_now(Duration::minutes(5)), false);
        image.original_name.clone_from(&padding);
        store.put(&image).await.unwrap();
        ids.push(image.id);
    }

    let mut scanned: Vec<String> = store
        .scan_all()
        .await
        .unwrap()
        .into_iter()
        .map(|image| image.id)
        .collect();
    scanned.sort();
    ids.sort();

    assert_eq!(scanned, ids);
}

#[tokio::test]
async fn test_delete_by_id() {
    let table = TestTable::new().await;
    let store = store(&table);
    let image = test_image(millis_from_now(Duration::minutes(5)), false);
    store.put(&image).await.unwrap();

    store.delete_by_id(&image.id).await.unwrap();

    assert_eq!(store.get_by_id(&image.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_check_connectivity() {
    let table = TestTable::new().await;
    store(&table).check_connectivity().await.unwrap();

    let missing = DynamoImageMetadataStore::new(table.client.clone(), "no-such-table".to_string());
    assert!(missing.check_connectivity().await.is_err());
}
