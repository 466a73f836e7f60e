//! Bounded worker pool over candidate files
//!
//! [`Pipeline::run`] spawns `worker_count` tokio tasks that pull relative
//! paths from a shared queue and process each file end to end. A failure
//! confined to one file is recorded in the [`ScanReport`] and the pool moves
//! on; a failure of the fingerprint store stops every worker and ends the run.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vcheck::app::pipeline::{Pipeline, PipelineConfig};
//! use vcheck::app::scanner::FfmpegScanner;
//! use vcheck::app::staging::StagingConfig;
//! use vcheck::app::store::FingerprintStore;
//!
//! # async fn example() -> vcheck::errors::Result<()> {
//! let store = Arc::new(FingerprintStore::open("/home/me/.vcheck.json").await?);
//! let pipeline = Pipeline::new(
//!     PipelineConfig::default(),
//!     store,
//!     StagingConfig::default().build_trackers(),
//!     Arc::new(FfmpegScanner::default()),
//! );
//! let files = vec!["show/ep1.mkv".to_string()];
//! let report = pipeline.run("/media/videos".as_ref(), files).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signals;
pub mod stats;
mod task;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::hash::FileHasher;
use crate::app::progress::{NoProgress, ProgressSink};
use crate::app::scanner::Scanner;
use crate::app::staging::CapacityTracker;
use crate::app::store::FingerprintStore;
use crate::errors::{AppError, PipelineError, Result};

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use signals::{create_shutdown_channel, wait_for_shutdown_signal, SignalHandler};
pub use stats::{FileOutcome, FileReport, ScanReport};

use task::TaskContext;

/// Worker pool that checks files against the store and scans the rest
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<FingerprintStore>,
    tiers: Vec<Arc<CapacityTracker>>,
    scanner: Arc<dyn Scanner>,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("store", &self.store.path())
            .field("tiers", &self.tiers.len())
            .field("scanner", &self.scanner)
            .finish()
    }
}

impl Pipeline {
    /// Create a new pipeline without progress reporting
    pub fn new(
        config: PipelineConfig,
        store: Arc<FingerprintStore>,
        tiers: Vec<Arc<CapacityTracker>>,
        scanner: Arc<dyn Scanner>,
    ) -> Self {
        Self {
            config,
            store,
            tiers,
            scanner,
            progress: Arc::new(NoProgress),
        }
    }

    /// Report progress to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Get the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the fingerprint store
    pub fn store(&self) -> &Arc<FingerprintStore> {
        &self.store
    }

    /// Staging tiers in priority order
    pub fn tiers(&self) -> &[Arc<CapacityTracker>] {
        &self.tiers
    }

    /// Forget failed results for `files` so the next run scans them again
    pub async fn forget_failed(&self, files: &[String]) -> Result<usize> {
        let removed = self.store.forget_failed(files).await;
        if removed > 0 {
            info!("Forgot {} previously failed files", removed);
            self.store.persist().await?;
        }
        Ok(removed)
    }

    /// Process every file in `files` (relative to `root`) to completion
    pub async fn run(&self, root: &Path, files: Vec<String>) -> Result<ScanReport> {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let report = self.run_until_shutdown(root, files, shutdown_rx).await;
        drop(shutdown_tx);
        report
    }

    /// Process `files` until done or until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Interrupted` if shutdown was broadcast, the
    /// first run-fatal error a worker hit (e.g. the store could not be
    /// persisted), or `PipelineError::WorkerPanic`.
    pub async fn run_until_shutdown(
        &self,
        root: &Path,
        files: Vec<String>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<ScanReport> {
        let started = Instant::now();
        let total = files.len();
        let worker_count = self.config.worker_count.max(1).min(total.max(1));
        info!("Checking {} files with {} workers", total, worker_count);
        self.progress.start(total, worker_count);

        let context = Arc::new(TaskContext {
            root: root.to_path_buf(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            tiers: self.tiers.clone(),
            scanner: Arc::clone(&self.scanner),
            hasher: FileHasher::with_chunk_size(self.config.hash_chunk_size),
        });
        let queue = Arc::new(Mutex::new(files.into_iter().collect::<VecDeque<_>>()));
        let (stop_tx, _) = broadcast::channel::<()>(1);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let interrupted = Arc::new(AtomicBool::new(false));

        let forwarder = {
            let stop_tx = stop_tx.clone();
            let interrupted = Arc::clone(&interrupted);
            tokio::spawn(async move {
                wait_for_shutdown_signal(shutdown).await;
                interrupted.store(true, Ordering::SeqCst);
                let _ = stop_tx.send(());
            })
        };

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    context: Arc::clone(&context),
                    queue: Arc::clone(&queue),
                    progress: Arc::clone(&self.progress),
                    results: result_tx.clone(),
                    stop_tx: stop_tx.clone(),
                    stop_rx: stop_tx.subscribe(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        drop(result_tx);

        let outcomes = join_all(handles).await;
        forwarder.abort();
        self.progress.finish();

        let mut fatal = None;
        for (worker_id, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                Err(join_error) => {
                    error!("Worker {} panicked: {}", worker_id, join_error);
                    fatal.get_or_insert(PipelineError::WorkerPanic { worker_id }.into());
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        if interrupted.load(Ordering::SeqCst) {
            return Err(PipelineError::Interrupted.into());
        }

        let mut report = ScanReport::new();
        while let Some((path, outcome)) = result_rx.recv().await {
            report.push(path, outcome);
        }
        report.set_elapsed(started.elapsed());

        for path in report.failed_paths() {
            warn!("FAILED: {}", path);
        }
        info!("{}", report.summary());
        Ok(report)
    }
}

/// One worker of the pool
struct Worker {
    id: usize,
    context: Arc<TaskContext>,
    queue: Arc<Mutex<VecDeque<String>>>,
    progress: Arc<dyn ProgressSink>,
    results: mpsc::UnboundedSender<(String, FileOutcome)>,
    stop_tx: broadcast::Sender<()>,
    stop_rx: broadcast::Receiver<()>,
}

impl Worker {
    async fn run(mut self) -> Result<()> {
        let reporter = self.progress.worker(self.id);
        debug!("Worker {} started", self.id);

        while let Some(path) = self.next_path() {
            let result = tokio::select! {
                _ = self.stop_rx.recv() => {
                    debug!("Worker {} abandoning {}", self.id, path);
                    return Ok(());
                }
                result = self.context.process(&path, reporter.as_ref()) => result,
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if !e.is_fatal() => {
                    warn!("Error checking {}: {}", path, error_chain(&e));
                    FileOutcome::Failed {
                        error: error_chain(&e),
                    }
                }
                Err(e) => {
                    error!("Stopping all workers: {}", error_chain(&e));
                    let _ = self.stop_tx.send(());
                    return Err(e);
                }
            };

            self.progress.file_finished(&path, outcome.is_failure());
            let _ = self.results.send((path, outcome));
        }

        debug!("Worker {} finished", self.id);
        Ok(())
    }

    fn next_path(&self) -> Option<String> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

/// `error: cause: cause` for log lines and reports
fn error_chain(error: &AppError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
