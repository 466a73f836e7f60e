//! MD5 content fingerprints
//!
//! [`Md5Hash`] stores a digest as its raw 16 bytes and (de)serialises it as a
//! lowercase hex string, which is the format kept in the fingerprint database.
//! [`FileHasher`] streams a file through MD5 in fixed-size chunks so that
//! multi-gigabyte videos never have to be held in memory. Stored digests are
//! read back as [`Digest`], which keeps strings that are not MD5 hex instead
//! of rejecting the database that contains them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::app::progress::ProgressReporter;
use crate::constants::hashing;
use crate::errors::InvalidHashError;

/// MD5 digest stored as a 16-byte array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Md5Hash([u8; 16]);

impl Md5Hash {
    /// Parse a 32-character hex string (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vcheck::app::Md5Hash;
    ///
    /// let hash = Md5Hash::from_hex("50c9d1c465f3cbff652be1509c2e2a4e")?;
    /// let hash_upper = Md5Hash::from_hex("50C9D1C465F3CBFF652BE1509C2E2A4E")?;
    /// assert_eq!(hash, hash_upper);
    /// # Ok::<(), vcheck::errors::InvalidHashError>(())
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self, InvalidHashError> {
        let invalid = || InvalidHashError {
            hash: hex.to_string(),
        };

        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 16];
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }

        Ok(Md5Hash(bytes))
    }

    /// Lowercase 32-character hex representation
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(32), |mut acc, b| {
            let _ = write!(&mut acc, "{:02x}", b);
            acc
        })
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Md5Hash(bytes)
    }
}

impl fmt::Display for Md5Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Md5Hash {
    type Err = InvalidHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Md5Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Md5Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Content digest as stored in the fingerprint database
///
/// Entries written by other tools or older versions may hold digests of
/// another algorithm or placeholders. Those never match a freshly computed
/// MD5, so the file is simply scanned again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Digest {
    /// 32-character MD5 hex digest
    Md5(Md5Hash),
    /// Any other stored string, kept verbatim
    Other(String),
}

impl Digest {
    /// The MD5 value, if this digest is one
    pub fn as_md5(&self) -> Option<&Md5Hash> {
        match self {
            Digest::Md5(hash) => Some(hash),
            Digest::Other(_) => None,
        }
    }

    /// Whether this digest equals `hash`
    pub fn matches(&self, hash: &Md5Hash) -> bool {
        self.as_md5() == Some(hash)
    }
}

impl From<Md5Hash> for Digest {
    fn from(hash: Md5Hash) -> Self {
        Digest::Md5(hash)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digest::Md5(hash) => write!(f, "{}", hash),
            Digest::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match Md5Hash::from_hex(&raw) {
            Ok(hash) => Digest::Md5(hash),
            Err(_) => Digest::Other(raw),
        })
    }
}

/// Streaming MD5 hasher for files
#[derive(Debug, Clone, Copy)]
pub struct FileHasher {
    chunk_size: usize,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self {
            chunk_size: hashing::HASH_CHUNK_SIZE,
        }
    }
}

impl FileHasher {
    /// Create a hasher that reads `chunk_size` bytes at a time
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Hash the full contents of `path`, reporting bytes read to `progress`
    pub async fn hash_file(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> std::io::Result<Md5Hash> {
        debug!("Calculating md5 of {}", path.display());

        let mut file = File::open(path).await?;
        let total = file.metadata().await?.len();
        progress.set_label("md5");
        progress.reset(total);

        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            context.consume(&buffer[..read]);
            progress.update(read as u64);
        }

        let hash = Md5Hash::from_bytes(context.compute().0);
        debug!("Hash of {} is {}", path.display(), hash);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::progress::NoProgress;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_valid_hex_strings() {
        let test_cases = [
            "50c9d1c465f3cbff652be1509c2e2a4e",
            "d41d8cd98f00b204e9800998ecf8427e",
            "00000000000000000000000000000000",
            "ffffffffffffffffffffffffffffffff",
        ];

        for hex in &test_cases {
            let hash = Md5Hash::from_hex(hex).unwrap();
            assert_eq!(hash.to_hex(), *hex);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let lower = Md5Hash::from_hex("50c9d1c465f3cbff652be1509c2e2a4e").unwrap();
        let upper = Md5Hash::from_hex("50C9D1C465F3CBFF652BE1509C2E2A4E").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_hex(), "50c9d1c465f3cbff652be1509c2e2a4e");
    }

    #[test]
    fn test_invalid_hex_strings() {
        let invalid_cases = [
            "",
            "50c9d1c465f3cbff652be1509c2e2a4",
            "50c9d1c465f3cbff652be1509c2e2a4e5",
            "50c9d1c465f3cbff652be1509c2e2a4g",
            "50c9d1c4 65f3cbff652be1509c2e2a4e",
            "hashsum",
        ];

        for hex in &invalid_cases {
            assert!(Md5Hash::from_hex(hex).is_err(), "Should reject: {}", hex);
        }
    }

    #[test]
    fn test_serialization() {
        let hash = Md5Hash::from_hex("50c9d1c465f3cbff652be1509c2e2a4e").unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"50c9d1c465f3cbff652be1509c2e2a4e\"");

        let deserialized: Md5Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, deserialized);

        assert!(serde_json::from_str::<Md5Hash>("\"not-a-hash\"").is_err());
    }

    #[test]
    fn test_stored_digest_keeps_foreign_values() {
        let md5: Digest = serde_json::from_str("\"D41D8CD98F00B204E9800998ECF8427E\"").unwrap();
        let empty = Md5Hash::from_hex("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(md5, Digest::Md5(empty));
        assert!(md5.matches(&empty));
        assert_eq!(
            serde_json::to_string(&md5).unwrap(),
            "\"d41d8cd98f00b204e9800998ecf8427e\""
        );

        let sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        for raw in [sha256, "hashsum"] {
            let digest: Digest = serde_json::from_str(&format!("\"{}\"", raw)).unwrap();
            assert_eq!(digest, Digest::Other(raw.to_string()));
            assert!(!digest.matches(&empty));
            assert_eq!(serde_json::to_string(&digest).unwrap(), format!("\"{}\"", raw));
        }
    }

    #[tokio::test]
    async fn test_hash_file_matches_known_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.mkv");
        tokio::fs::write(&path, b"").await.unwrap();

        let hash = FileHasher::default()
            .hash_file(&path, &NoProgress)
            .await
            .unwrap();
        assert_eq!(hash.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_hash_file_is_chunk_size_independent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("video.mkv");
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &content).await.unwrap();

        let small = FileHasher::with_chunk_size(7)
            .hash_file(&path, &NoProgress)
            .await
            .unwrap();
        let large = FileHasher::default()
            .hash_file(&path, &NoProgress)
            .await
            .unwrap();

        assert_eq!(small, large);
        assert_eq!(small, Md5Hash::from_bytes(md5::compute(&content).0));
    }

    #[tokio::test]
    async fn test_hash_file_reports_every_byte() {
        struct Counter(AtomicU64, AtomicU64);
        impl ProgressReporter for Counter {
            fn set_label(&self, _label: &str) {}
            fn reset(&self, total: u64) {
                self.0.store(total, Ordering::SeqCst);
            }
            fn update(&self, delta: u64) {
                self.1.fetch_add(delta, Ordering::SeqCst);
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("video.mp4");
        tokio::fs::write(&path, vec![1u8; 20_000]).await.unwrap();

        let counter = Counter(AtomicU64::new(0), AtomicU64::new(0));
        FileHasher::default().hash_file(&path, &counter).await.unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 20_000);
        assert_eq!(counter.1.load(Ordering::SeqCst), 20_000);
    }

    #[tokio::test]
    async fn test_hash_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileHasher::default()
            .hash_file(&temp_dir.path().join("missing.avi"), &NoProgress)
            .await;
        assert!(result.is_err());
    }
}
