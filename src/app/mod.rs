//! Core application logic for vcheck
//!
//! This module contains the fingerprint store, the tiered staging cache, the
//! scanner seam and the worker pool that ties them together. Nothing here
//! touches the terminal; progress is reported through [`progress`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vcheck::app::{discover, DiscoveryFilter, FfmpegScanner, FingerprintStore};
//! use vcheck::app::{Pipeline, PipelineConfig, StagingConfig};
//!
//! # async fn example() -> vcheck::errors::Result<()> {
//! let root = std::path::Path::new("/media/videos");
//! let files = discover(root, &DiscoveryFilter::default())?;
//!
//! let store = Arc::new(FingerprintStore::open("/home/me/.vcheck.json").await?);
//! let pipeline = Pipeline::new(
//!     PipelineConfig::default(),
//!     store,
//!     StagingConfig::default().build_trackers(),
//!     Arc::new(FfmpegScanner::default()),
//! );
//!
//! let report = pipeline.run(root, files).await?;
//! for path in report.failed_paths() {
//!     println!("broken: {}", path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod hash;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod staging;
pub mod store;

// Re-export main public API
pub use discovery::{discover, DiscoveryFilter};
pub use hash::{Digest, FileHasher, Md5Hash};
pub use pipeline::{
    FileOutcome, FileReport, Pipeline, PipelineConfig, PipelineConfigBuilder, ScanReport,
};
pub use progress::{NoProgress, ProgressReporter, ProgressSink};
pub use scanner::{remux, FfmpegScanner, ScanOutcome, Scanner, ScannerConfig};
pub use staging::{CapacityTracker, StagedFile, StagingConfig};
pub use store::{FingerprintEntry, FingerprintStore};
