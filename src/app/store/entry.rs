//! Fingerprint database entries

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::hash::{Digest, Md5Hash};
use crate::constants::MAX_DIAGNOSTIC_LINES;

/// Last known scan result for one file
///
/// Field names on disk follow the database format shared with earlier
/// versions of the tool (`videofile`, `filesize`, `output`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// Path relative to the scan root
    #[serde(rename = "videofile")]
    pub path: String,

    /// Content digest, absent for legacy path-only entries
    #[serde(default)]
    pub hash: Option<Digest>,

    /// True when the scanner reported no errors
    pub status: bool,

    /// Unix timestamp of scan completion
    pub timestamp: i64,

    /// File size at last scan, absent in legacy entries
    #[serde(rename = "filesize", default)]
    pub size: Option<u64>,

    /// Scanner output, only kept for failed files
    #[serde(
        rename = "output",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub diagnostics: Vec<String>,
}

impl FingerprintEntry {
    /// Build an entry for a scan that just completed
    ///
    /// Diagnostics are dropped for clean files and truncated to
    /// [`MAX_DIAGNOSTIC_LINES`] otherwise.
    pub fn new(
        path: impl Into<String>,
        hash: Option<Md5Hash>,
        size: u64,
        status: bool,
        mut diagnostics: Vec<String>,
    ) -> Self {
        if status {
            diagnostics.clear();
        } else {
            diagnostics.truncate(MAX_DIAGNOSTIC_LINES);
        }

        Self {
            path: path.into(),
            hash: hash.map(Digest::from),
            status,
            timestamp: Utc::now().timestamp(),
            size: Some(size),
            diagnostics,
        }
    }

    /// Whether this entry records a failed scan
    pub fn is_failed(&self) -> bool {
        !self.status
    }
}
