//! Persistent fingerprint database with atomic flushes

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::hash::Md5Hash;
use crate::constants::store::TEMP_FILE_SUFFIX;
use crate::errors::{StoreError, StoreResult};

use super::entry::FingerprintEntry;

/// On-disk document shape: `{"files": {"<relative path>": entry}}`
///
/// Anything else, including a bare path map, is rejected as corrupt so that it
/// is never overwritten by the next flush.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    files: IndexMap<String, FingerprintEntry>,
}

/// Mapping from relative path to last known scan result
///
/// Every operation, including [`persist`](Self::persist), runs under one
/// store-wide lock, so a flush never observes a half-applied update.
#[derive(Debug)]
pub struct FingerprintStore {
    path: PathBuf,
    files: Mutex<IndexMap<String, FingerprintEntry>>,
}

impl FingerprintStore {
    /// Open the database at `path`, creating and persisting an empty one if absent
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read, is not a valid
    /// database document, or a fresh database cannot be written.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        debug!("Fingerprint database path is {}", path.display());

        if fs::try_exists(&path).await.unwrap_or(false) {
            let content = fs::read(&path).await.map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            let document: Document =
                serde_json::from_slice(&content).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?;

            debug!(
                "Loaded existing database with {} entries",
                document.files.len()
            );
            Ok(Self {
                path,
                files: Mutex::new(document.files),
            })
        } else {
            info!("Creating new fingerprint database at {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::AtomicWriteFailed {
                        temp_path: temp_path_for(&path),
                        final_path: path.clone(),
                        source,
                    })?;
            }

            let store = Self {
                path,
                files: Mutex::new(IndexMap::new()),
            };
            store.persist().await?;
            Ok(store)
        }
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored status for `path` if every supplied criterion matches
    ///
    /// Returns `None` for an unknown path or any mismatch. With neither
    /// criterion supplied the stored status is returned as is. A legacy entry
    /// without a recorded size has it backfilled from `size` before matching.
    pub async fn lookup(
        &self,
        path: &str,
        hash: Option<&Md5Hash>,
        size: Option<u64>,
    ) -> Option<bool> {
        let mut files = self.files.lock().await;
        let entry = files.get_mut(path)?;

        if hash.is_none() && size.is_none() {
            return Some(entry.status);
        }

        if entry.size.is_none() {
            if let Some(size) = size {
                warn!("Migration: setting filesize of {} to {}", path, size);
                entry.size = Some(size);
            }
        }

        let size_match = size.map_or(true, |size| entry.size == Some(size));
        let hash_match = hash.map_or(true, |hash| {
            entry
                .hash
                .as_ref()
                .is_some_and(|stored| stored.matches(hash))
        });

        if !size_match {
            debug!(
                "Size mismatch for {}: old {:?} vs. new {:?}",
                path, entry.size, size
            );
        }
        if !hash_match {
            debug!(
                "Hash mismatch for {}: old {:?} vs. new {:?}",
                path,
                entry.hash.as_ref().map(|h| h.to_string()),
                hash.map(|h| h.to_hex())
            );
        }

        (size_match && hash_match).then_some(entry.status)
    }

    /// Insert or fully replace the entry for `entry.path`
    pub async fn record(&self, entry: FingerprintEntry) {
        let mut files = self.files.lock().await;
        files.insert(entry.path.clone(), entry);
    }

    /// Remove the entry for `path`, returning it if present
    pub async fn forget(&self, path: &str) -> Option<FingerprintEntry> {
        let mut files = self.files.lock().await;
        files.shift_remove(path)
    }

    /// Remove every failed entry among `paths`, returning how many were removed
    pub async fn forget_failed<I, S>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut files = self.files.lock().await;
        let mut removed = 0;
        for path in paths {
            let path = path.as_ref();
            if files.get(path).is_some_and(FingerprintEntry::is_failed) {
                debug!("Rescanning previously failed file {}", path);
                files.shift_remove(path);
                removed += 1;
            }
        }
        removed
    }

    /// Snapshot of all entries in insertion order
    pub async fn all(&self) -> Vec<FingerprintEntry> {
        self.files.lock().await.values().cloned().collect()
    }

    /// Failed entries sorted by path
    pub async fn failed(&self) -> Vec<FingerprintEntry> {
        let mut failed: Vec<_> = self
            .files
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_failed())
            .cloned()
            .collect();
        failed.sort_by(|a, b| a.path.cmp(&b.path));
        failed
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Whether the store has no entries
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }

    /// Write the whole store to a temporary file and rename it over the database
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if serialisation or any filesystem step fails. The
    /// previously durable file is left untouched in that case.
    pub async fn persist(&self) -> StoreResult<()> {
        let files = self.files.lock().await;
        let document = DocumentRef { files: &files };
        let content = serde_json::to_vec_pretty(&document).map_err(StoreError::Serialize)?;

        let temp_path = temp_path_for(&self.path);
        let write_failed = |source| StoreError::AtomicWriteFailed {
            temp_path: temp_path.clone(),
            final_path: self.path.clone(),
            source,
        };

        let mut file = fs::File::create(&temp_path).await.map_err(write_failed)?;
        file.write_all(&content).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;
        drop(file);

        if let Err(source) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_failed(source));
        }

        debug!(
            "Flushed {} entries to {}",
            files.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Borrowed view of [`Document`] for serialising without cloning the map
#[derive(Serialize)]
struct DocumentRef<'a> {
    files: &'a IndexMap<String, FingerprintEntry>,
}

/// Temporary file used for atomic writes, in the same directory as `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hash(hex: &str) -> Md5Hash {
        Md5Hash::from_hex(hex).unwrap()
    }

    const H1: &str = "11111111111111111111111111111111";
    const H2: &str = "22222222222222222222222222222222";

    async fn store_with_entry(temp_dir: &TempDir) -> FingerprintStore {
        let store = FingerprintStore::open(temp_dir.path().join("db.json"))
            .await
            .unwrap();
        store
            .record(FingerprintEntry::new("a.mkv", Some(hash(H1)), 100, true, vec![]))
            .await;
        store
    }

    #[tokio::test]
    async fn test_open_creates_empty_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("db.json");

        let store = FingerprintStore::open(&db_path).await.unwrap();
        assert!(store.is_empty().await);

        let content = std::fs::read_to_string(&db_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, serde_json::json!({"files": {}}));
    }

    #[tokio::test]
    async fn test_corrupt_database_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("db.json");
        std::fs::write(&db_path, "{\"files\": {").unwrap();

        let result = FingerprintStore::open(&db_path).await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));

        // The damaged file is left for the user to inspect
        assert_eq!(std::fs::read_to_string(&db_path).unwrap(), "{\"files\": {");
    }

    #[tokio::test]
    async fn test_document_without_files_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("db.json");
        let bare = format!(
            r#"{{"old.avi": {{"videofile": "old.avi", "hash": "{}", "status": false, "timestamp": 1}}}}"#,
            H1
        );

        for content in [bare.as_str(), "{}", r#"{"foo": 1}"#, r#"{"files": {}, "extra": 1}"#] {
            std::fs::write(&db_path, content).unwrap();

            let result = FingerprintStore::open(&db_path).await;
            assert!(
                matches!(result, Err(StoreError::Corrupt { .. })),
                "Should reject: {}",
                content
            );
            assert_eq!(std::fs::read_to_string(&db_path).unwrap(), content);
        }
    }

    #[tokio::test]
    async fn test_foreign_digest_loads_and_misses() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("db.json");
        let sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        std::fs::write(
            &db_path,
            format!(
                r#"{{"files": {{
                    "a.mkv": {{"videofile": "a.mkv", "hash": "{}", "status": true, "timestamp": 1, "filesize": 100}},
                    "b.mkv": {{"videofile": "b.mkv", "hash": "hashsum", "status": true, "timestamp": 1, "filesize": 100}}
                }}}}"#,
                sha256
            ),
        )
        .unwrap();

        let store = FingerprintStore::open(&db_path).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.lookup("a.mkv", Some(&hash(H1)), Some(100)).await, None);
        assert_eq!(store.lookup("b.mkv", Some(&hash(H1)), Some(100)).await, None);
        assert_eq!(store.lookup("a.mkv", None, Some(100)).await, Some(true));

        // Unparsed digests are written back unchanged
        store.persist().await.unwrap();
        let content = std::fs::read_to_string(&db_path).unwrap();
        assert!(content.contains(sha256));
        assert!(content.contains("\"hashsum\""));
    }

    #[tokio::test]
    async fn test_lookup_matches_supplied_criteria() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_entry(&temp_dir).await;

        assert_eq!(store.lookup("a.mkv", Some(&hash(H1)), Some(100)).await, Some(true));
        assert_eq!(store.lookup("a.mkv", Some(&hash(H2)), Some(100)).await, None);
        assert_eq!(store.lookup("a.mkv", Some(&hash(H1)), Some(999)).await, None);
        assert_eq!(store.lookup("a.mkv", None, Some(100)).await, Some(true));
        assert_eq!(store.lookup("a.mkv", None, None).await, Some(true));
        assert_eq!(store.lookup("b.mkv", Some(&hash(H1)), Some(100)).await, None);
    }

    #[tokio::test]
    async fn test_lookup_backfills_missing_size() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("db.json");
        std::fs::write(
            &db_path,
            format!(
                r#"{{"files": {{"old.avi": {{"videofile": "old.avi", "hash": "{}", "status": false, "timestamp": 1}}}}}}"#,
                H1
            ),
        )
        .unwrap();

        let store = FingerprintStore::open(&db_path).await.unwrap();
        assert_eq!(store.lookup("old.avi", Some(&hash(H1)), Some(42)).await, Some(false));

        let entry = store.all().await.remove(0);
        assert_eq!(entry.size, Some(42));
        assert!(!entry.status);

        // The backfilled size now takes part in staleness checks
        assert_eq!(store.lookup("old.avi", Some(&hash(H1)), Some(43)).await, None);
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("db.json");

        let store = FingerprintStore::open(&db_path).await.unwrap();
        let entries = vec![
            FingerprintEntry::new("z.mkv", Some(hash(H1)), 1, true, vec![]),
            FingerprintEntry::new("a/b.mp4", Some(hash(H2)), 2, false, vec!["bad".into()]),
            FingerprintEntry::new("c.avi", None, 3, true, vec![]),
        ];
        for entry in &entries {
            store.record(entry.clone()).await;
        }
        store.persist().await.unwrap();

        let reloaded = FingerprintStore::open(&db_path).await.unwrap();
        assert_eq!(reloaded.all().await, entries);
        assert!(!temp_path_for(&db_path).exists());
    }

    #[tokio::test]
    async fn test_record_replaces_whole_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_entry(&temp_dir).await;

        store
            .record(FingerprintEntry::new("a.mkv", Some(hash(H2)), 5, false, vec!["x".into()]))
            .await;

        let all = store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].hash, Some(hash(H2).into()));
        assert_eq!(all[0].diagnostics, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_forget_failed_only_touches_failed_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_entry(&temp_dir).await;
        store
            .record(FingerprintEntry::new("broken.mkv", None, 1, false, vec![]))
            .await;
        store
            .record(FingerprintEntry::new("elsewhere.mkv", None, 1, false, vec![]))
            .await;

        let removed = store
            .forget_failed(["a.mkv", "broken.mkv", "missing.mkv"])
            .await;
        assert_eq!(removed, 1);

        let paths: Vec<_> = store.all().await.into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["a.mkv", "elsewhere.mkv"]);

        assert!(store.forget("a.mkv").await.is_some());
        assert!(store.forget("a.mkv").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_entry(&temp_dir).await;
        for path in ["m.mkv", "b.mkv", "x.mkv"] {
            store
                .record(FingerprintEntry::new(path, None, 1, false, vec![]))
                .await;
        }

        let failed: Vec<_> = store.failed().await.into_iter().map(|e| e.path).collect();
        assert_eq!(failed, vec!["b.mkv", "m.mkv", "x.mkv"]);
    }
}
