//! Files made locally readable for the duration of one task
//!
//! [`StagedFile::acquire`] copies a file into the first tier that grants a
//! reservation, or falls back to reading the original in place. The staged
//! copy and its reservation are released when the value is dropped, so every
//! exit path of a task (return, error, cancellation) cleans up exactly once.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, warn};

use crate::app::progress::ProgressReporter;
use crate::errors::{StagingError, StagingResult};

use super::tracker::CapacityTracker;

/// A file readable at [`path`](StagedFile::path) until dropped
#[derive(Debug)]
pub enum StagedFile {
    /// Copied into a staging tier
    Materialized(StagedCopy),
    /// No tier had room; the original is read directly
    PassThrough { original: PathBuf, size: u64 },
}

/// A staged copy holding a reservation on its tier
#[derive(Debug)]
pub struct StagedCopy {
    original: PathBuf,
    staged: PathBuf,
    size: u64,
    tier: Option<Arc<CapacityTracker>>,
}

impl StagedFile {
    /// Stage `path` into the first of `tiers` with room for it
    ///
    /// The file size is read once. Tiers are tried in order; if none grants a
    /// reservation the result is a pass-through. A copy failure after a
    /// reservation was granted removes the partial copy, frees the
    /// reservation and returns the error.
    ///
    /// # Errors
    ///
    /// Returns `StagingError` if the source cannot be inspected or copied.
    pub async fn acquire(
        path: &Path,
        tiers: &[Arc<CapacityTracker>],
        chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> StagingResult<Self> {
        let size = fs::metadata(path)
            .await
            .map_err(|source| StagingError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        for tier in tiers {
            if !tier.reserve(size) {
                continue;
            }

            // Owns the reservation from here on
            let copy = StagedCopy {
                original: path.to_path_buf(),
                staged: tier.root().join(staged_file_name(path)),
                size,
                tier: Some(Arc::clone(tier)),
            };

            debug!("Caching {} to {}", path.display(), copy.staged.display());
            copy_in_chunks(path, &copy.staged, chunk_size, size, progress)
                .await
                .map_err(|source| StagingError::Copy {
                    source_path: path.to_path_buf(),
                    staged_path: copy.staged.clone(),
                    source,
                })?;

            return Ok(StagedFile::Materialized(copy));
        }

        debug!("No tier has room for {}, reading in place", path.display());
        Ok(StagedFile::PassThrough {
            original: path.to_path_buf(),
            size,
        })
    }

    /// Path to read the file contents from
    pub fn path(&self) -> &Path {
        match self {
            StagedFile::Materialized(copy) => &copy.staged,
            StagedFile::PassThrough { original, .. } => original,
        }
    }

    /// Path of the file that was staged
    pub fn original_path(&self) -> &Path {
        match self {
            StagedFile::Materialized(copy) => &copy.original,
            StagedFile::PassThrough { original, .. } => original,
        }
    }

    /// File size observed at acquisition
    pub fn size(&self) -> u64 {
        match self {
            StagedFile::Materialized(copy) => copy.size,
            StagedFile::PassThrough { size, .. } => *size,
        }
    }

    /// Whether the file was copied into a tier
    pub fn is_staged(&self) -> bool {
        matches!(self, StagedFile::Materialized(_))
    }

    /// Tier holding the reservation, if staged
    pub fn tier(&self) -> Option<&CapacityTracker> {
        match self {
            StagedFile::Materialized(copy) => copy.tier.as_deref(),
            StagedFile::PassThrough { .. } => None,
        }
    }
}

impl Drop for StagedCopy {
    fn drop(&mut self) {
        let Some(tier) = self.tier.take() else {
            return;
        };

        // Blocking unlink; the copy is gone before the reservation is freed,
        // on any runtime flavour
        match std::fs::remove_file(&self.staged) {
            Ok(()) => debug!("Removed staged copy {}", self.staged.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staged copy {}: {}",
                self.staged.display(),
                e
            ),
        }

        if let Err(e) = tier.free(self.size) {
            error!("{}", e);
            debug_assert!(false, "{}", e);
        }
    }
}

/// `<random hex>-<file name>` so equal base names never collide in a tier
fn staged_file_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "staged".to_string());
    format!("{:016x}-{}", fastrand::u64(..), file_name)
}

async fn copy_in_chunks(
    source: &Path,
    destination: &Path,
    chunk_size: usize,
    total: u64,
    progress: &dyn ProgressReporter,
) -> std::io::Result<()> {
    let mut reader = File::open(source).await?;
    let mut writer = File::create(destination).await?;
    let mut buffer = vec![0u8; chunk_size.max(1)];

    progress.set_label("cache");
    progress.reset(total);

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read]).await?;
        progress.update(read as u64);
    }

    writer.flush().await
}
