//! One file, end to end
//!
//! Stage, fingerprint, consult the store, and only on a miss run the scanner
//! and record its verdict. The staged copy lives exactly as long as the task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::app::hash::{FileHasher, Md5Hash};
use crate::app::progress::ProgressReporter;
use crate::app::scanner::{truncate_diagnostics, Scanner};
use crate::app::staging::{CapacityTracker, StagedFile};
use crate::app::store::{FingerprintEntry, FingerprintStore};
use crate::errors::{Result, TaskError};

use super::config::PipelineConfig;
use super::stats::FileOutcome;

/// Everything a task needs, shared by all workers of a run
#[derive(Debug)]
pub(crate) struct TaskContext {
    pub root: PathBuf,
    pub config: PipelineConfig,
    pub store: Arc<FingerprintStore>,
    pub tiers: Vec<Arc<CapacityTracker>>,
    pub scanner: Arc<dyn Scanner>,
    pub hasher: FileHasher,
}

impl TaskContext {
    /// Process the file at `relative` under the scan root
    ///
    /// Errors confined to this file come back as [`AppError::Task`]; a
    /// failure to persist the store is returned as [`AppError::Store`].
    ///
    /// [`AppError::Task`]: crate::errors::AppError::Task
    /// [`AppError::Store`]: crate::errors::AppError::Store
    pub async fn process(&self, relative: &str, progress: &dyn ProgressReporter) -> Result<FileOutcome> {
        let source = self.root.join(relative);
        let staged = StagedFile::acquire(
            &source,
            &self.tiers,
            self.config.copy_chunk_size,
            progress,
        )
        .await
        .map_err(TaskError::from)?;
        let size = staged.size();

        let mut hash = if self.config.path_only {
            None
        } else {
            Some(self.hash(staged.path(), progress).await?)
        };

        let cached = self.store.lookup(relative, hash.as_ref(), Some(size)).await;
        let cached = if self.config.force_rescan {
            debug!("Forcing a rescan for {}", relative);
            None
        } else {
            cached
        };

        if let Some(status) = cached {
            debug!("Found {} in db, using old status {}", relative, status);
            return Ok(FileOutcome::CacheHit { status });
        }

        let outcome = self
            .scanner
            .scan(staged.path(), progress)
            .await
            .map_err(TaskError::from)?;

        if hash.is_none() {
            hash = Some(self.hash(staged.path(), progress).await?);
        }

        let diagnostics = truncate_diagnostics(outcome.diagnostics);
        if !outcome.success {
            warn!("{} has errors: {}", relative, diagnostics.join(" | "));
        }

        self.store
            .record(FingerprintEntry::new(
                relative,
                hash,
                size,
                outcome.success,
                diagnostics.clone(),
            ))
            .await;
        self.store.persist().await?;

        Ok(FileOutcome::Scanned {
            status: outcome.success,
            diagnostics: if outcome.success { Vec::new() } else { diagnostics },
        })
    }

    async fn hash(&self, path: &Path, progress: &dyn ProgressReporter) -> Result<Md5Hash> {
        let hash = self
            .hasher
            .hash_file(path, progress)
            .await
            .map_err(|source| TaskError::Hash {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(hash)
    }
}
