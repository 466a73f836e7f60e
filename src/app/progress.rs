//! Progress reporting capabilities injected into the core
//!
//! The staging copy, the content hash and the scanner feed all report byte
//! progress through a [`ProgressReporter`]; the worker pool reports file-level
//! progress through a [`ProgressSink`]. The core never touches the terminal, so
//! it can be driven headless in tests with [`NoProgress`].

use std::sync::Arc;

/// Byte-level progress for one worker's current operation
pub trait ProgressReporter: Send + Sync {
    /// Name the operation currently in progress (e.g. "stage", "md5", "ffmpeg")
    fn set_label(&self, label: &str);

    /// Start a new operation of `total` bytes
    fn reset(&self, total: u64);

    /// Advance the current operation by `delta` bytes
    fn update(&self, delta: u64);
}

/// File-level progress for a whole scan run
pub trait ProgressSink: Send + Sync {
    /// Called once before any worker starts
    fn start(&self, total_files: usize, worker_count: usize);

    /// Reporter for a single worker's byte-level progress
    fn worker(&self, worker_id: usize) -> Arc<dyn ProgressReporter>;

    /// Called once per finished file
    fn file_finished(&self, path: &str, failed: bool);

    /// Called once after every worker has stopped
    fn finish(&self);
}

/// Progress implementation that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_label(&self, _label: &str) {}

    fn reset(&self, _total: u64) {}

    fn update(&self, _delta: u64) {}
}

impl ProgressSink for NoProgress {
    fn start(&self, _total_files: usize, _worker_count: usize) {}

    fn worker(&self, _worker_id: usize) -> Arc<dyn ProgressReporter> {
        Arc::new(NoProgress)
    }

    fn file_finished(&self, _path: &str, _failed: bool) {}

    fn finish(&self) {}
}
