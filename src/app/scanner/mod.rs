//! External decode-error scanning
//!
//! The [`Scanner`] trait is the seam between the pipeline and the tool that
//! actually decodes a file. [`FfmpegScanner`] is the production
//! implementation; tests substitute their own.

pub mod ffmpeg;
pub mod filter;
pub mod remux;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::app::progress::ProgressReporter;
use crate::errors::ScanResult;

pub use ffmpeg::{FfmpegScanner, ScannerConfig};
pub use filter::{filter_diagnostics, truncate_diagnostics};
pub use remux::remux;

/// Result of a completed scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// True when no relevant diagnostics were produced
    pub success: bool,
    /// Filtered diagnostic lines
    pub diagnostics: Vec<String>,
}

impl ScanOutcome {
    /// Outcome from already-filtered diagnostics; empty means clean
    pub fn from_diagnostics(diagnostics: Vec<String>) -> Self {
        Self {
            success: diagnostics.is_empty(),
            diagnostics,
        }
    }

    /// Outcome for raw tool output
    pub fn from_output(output: &str) -> Self {
        Self::from_diagnostics(filter_diagnostics(output))
    }

    /// A clean outcome
    pub fn clean() -> Self {
        Self::from_diagnostics(Vec::new())
    }
}

/// Decodes a file and reports whether it is free of errors
#[async_trait]
pub trait Scanner: Send + Sync + fmt::Debug {
    /// Scan the file at `path`, reporting bytes consumed to `progress`
    ///
    /// # Errors
    ///
    /// Returns `ScanError` when the tool cannot produce a verdict at all
    /// (failed to start, killed, stalled). A broken file is an `Ok` outcome
    /// with `success == false`.
    async fn scan(&self, path: &Path, progress: &dyn ProgressReporter) -> ScanResult<ScanOutcome>;
}
