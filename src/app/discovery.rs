//! Candidate file discovery
//!
//! Walks a scan root and returns every video file beneath it as a path
//! relative to the root, so moving or remounting the library does not
//! invalidate the fingerprint database.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::constants::discovery;
use crate::errors::DiscoveryError;

/// Which files and directories discovery considers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFilter {
    /// File extensions without the dot, matched case-sensitively
    pub extensions: Vec<String>,
    /// Directories whose name starts with any of these are skipped entirely
    pub excluded_dir_prefixes: Vec<String>,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            extensions: discovery::VIDEO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            excluded_dir_prefixes: discovery::EXCLUDED_DIR_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

impl DiscoveryFilter {
    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.excluded_dir_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

/// Sorted, deduplicated candidate paths under `root`, relative to `root`
///
/// Unreadable subdirectories are logged and skipped.
///
/// # Errors
///
/// Returns `DiscoveryError` if `root` is not a readable directory.
pub fn discover(root: &Path, filter: &DiscoveryFilter) -> Result<Vec<String>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut found = BTreeSet::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !filter.is_excluded_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_dir() || !path.is_file() || !filter.is_candidate(path) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        match relative.to_str() {
            Some(relative) => {
                found.insert(relative.to_string());
            }
            // A lossy key would not map back to the file on disk
            None => warn!("Skipping file with non UTF-8 name: {}", path.display()),
        }
    }

    debug!("Found {} video files in {}", found.len(), root.display());
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_discovers_relative_sorted_video_files() {
        let dir = TempDir::new().unwrap();
        for file in [
            "z.mkv",
            "a/b.mp4",
            "a/notes.txt",
            "c/d/e.avi",
            "upper.MKV",
            "noext",
        ] {
            touch(dir.path(), file);
        }

        let found = discover(dir.path(), &DiscoveryFilter::default()).unwrap();
        assert_eq!(found, vec!["a/b.mp4", "c/d/e.avi", "z.mkv"]);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "@eaDir/thumb.mkv");
        touch(dir.path(), "show/@Recycle/old.mkv");
        touch(dir.path(), "show/ep1.mkv");
        touch(dir.path(), "show/not@excluded/ep2.mkv");

        let found = discover(dir.path(), &DiscoveryFilter::default()).unwrap();
        assert_eq!(found, vec!["show/ep1.mkv", "show/not@excluded/ep2.mkv"]);
    }

    #[test]
    fn test_custom_filter() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.webm");
        touch(dir.path(), "b.mkv");
        touch(dir.path(), "_skip/c.webm");

        let filter = DiscoveryFilter {
            extensions: vec!["webm".to_string()],
            excluded_dir_prefixes: vec!["_".to_string()],
        };
        assert_eq!(discover(dir.path(), &filter).unwrap(), vec!["a.webm"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        touch(dir.path(), "good.mkv");
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xffname.mkv")), b"x").unwrap();

        let found = discover(dir.path(), &DiscoveryFilter::default()).unwrap();
        assert_eq!(found, vec!["good.mkv"]);
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "file.mkv");

        assert!(matches!(
            discover(&dir.path().join("file.mkv"), &DiscoveryFilter::default()),
            Err(DiscoveryError::NotADirectory { .. })
        ));
        assert!(matches!(
            discover(&dir.path().join("missing"), &DiscoveryFilter::default()),
            Err(DiscoveryError::NotADirectory { .. })
        ));
    }
}
