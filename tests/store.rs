//! Integration tests for the fingerprint database
//!
//! These tests go through the public API only: records survive a reopen, the
//! staleness criteria decide cache hits, and legacy documents are migrated.

use tempfile::TempDir;
use vcheck::app::{FingerprintEntry, FingerprintStore, Md5Hash};

fn hash(byte: u8) -> Md5Hash {
    Md5Hash::from_bytes([byte; 16])
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("db.json");

    {
        let store = FingerprintStore::open(&db_path).await.unwrap();
        store
            .record(FingerprintEntry::new("a/good.mkv", Some(hash(1)), 100, true, vec![]))
            .await;
        store
            .record(FingerprintEntry::new(
                "b/bad.mp4",
                Some(hash(2)),
                200,
                false,
                vec!["error while decoding MB 1 1".to_string()],
            ))
            .await;
        store.persist().await.unwrap();
    }

    let store = FingerprintStore::open(&db_path).await.unwrap();
    assert_eq!(store.len().await, 2);
    assert_eq!(
        store.lookup("a/good.mkv", Some(&hash(1)), Some(100)).await,
        Some(true)
    );

    let failed = store.failed().await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, "b/bad.mp4");
    assert_eq!(failed[0].diagnostics, vec!["error while decoding MB 1 1"]);
    assert!(!temp_dir.path().join("nested").join("db.json.tmp").exists());
}

#[tokio::test]
async fn test_lookup_criteria() {
    let temp_dir = TempDir::new().unwrap();
    let store = FingerprintStore::open(temp_dir.path().join("db.json"))
        .await
        .unwrap();
    store
        .record(FingerprintEntry::new("x.mkv", Some(hash(9)), 5000, false, vec![]))
        .await;

    // Both match
    assert_eq!(store.lookup("x.mkv", Some(&hash(9)), Some(5000)).await, Some(false));
    // Either mismatch is a miss
    assert_eq!(store.lookup("x.mkv", Some(&hash(8)), Some(5000)).await, None);
    assert_eq!(store.lookup("x.mkv", Some(&hash(9)), Some(4999)).await, None);
    // Path and size only
    assert_eq!(store.lookup("x.mkv", None, Some(5000)).await, Some(false));
    // Unknown path
    assert_eq!(store.lookup("y.mkv", Some(&hash(9)), Some(5000)).await, None);
}

#[tokio::test]
async fn test_legacy_document_is_migrated() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db.json");
    let legacy = format!(
        r#"{{"files": {{"old.avi": {{"videofile": "old.avi", "hash": "{}", "status": true, "timestamp": 1500000000}}}}}}"#,
        hash(3).to_hex()
    );
    std::fs::write(&db_path, legacy).unwrap();

    let store = FingerprintStore::open(&db_path).await.unwrap();
    assert_eq!(
        store.lookup("old.avi", Some(&hash(3)), Some(777)).await,
        Some(true)
    );
    // Size was backfilled by the first lookup
    assert_eq!(store.lookup("old.avi", None, Some(778)).await, None);
    assert_eq!(store.all().await[0].size, Some(777));
}

#[tokio::test]
async fn test_bare_path_map_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db.json");
    let bare = format!(
        r#"{{"old.avi": {{"videofile": "old.avi", "hash": "{}", "status": false, "timestamp": 1}}}}"#,
        hash(3).to_hex()
    );
    std::fs::write(&db_path, &bare).unwrap();

    assert!(FingerprintStore::open(&db_path).await.is_err());
    assert_eq!(std::fs::read_to_string(&db_path).unwrap(), bare);
}

#[tokio::test]
async fn test_corrupt_document_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db.json");
    std::fs::write(&db_path, "{ not json").unwrap();

    assert!(FingerprintStore::open(&db_path).await.is_err());
    assert_eq!(std::fs::read_to_string(&db_path).unwrap(), "{ not json");
}
