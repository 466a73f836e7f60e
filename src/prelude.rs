//! Prelude module for the vcheck library
//!
//! Re-exports the items needed to drive a scan from another program with a
//! single `use vcheck::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vcheck::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let root = Path::new("/media/videos");
//!     let files = discover(root, &config.discovery_filter())?;
//!
//!     let store = Arc::new(FingerprintStore::open(config.database_path()?).await?);
//!     let pipeline = Pipeline::new(
//!         config.pipeline_config(),
//!         store,
//!         config.staging.build_trackers(),
//!         Arc::new(FfmpegScanner::new(config.scanner.clone())),
//!     );
//!     println!("{}", pipeline.run(root, files).await?.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Configuration
pub use crate::config::AppConfig;

pub use crate::app::{
    discover, DiscoveryFilter, FfmpegScanner, FileOutcome, FingerprintEntry, FingerprintStore,
    Md5Hash, NoProgress, Pipeline, PipelineConfig, ProgressReporter, ProgressSink, ScanOutcome,
    ScanReport, Scanner, StagingConfig,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_WORKER_COUNT, MAX_DIAGNOSTIC_LINES};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline_config().worker_count, DEFAULT_WORKER_COUNT);
        assert!(config.discovery_filter().extensions.contains(&"mkv".to_string()));

        let _staging = StagingConfig::default();
        let _path = PathBuf::from("/tmp/test");
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            FingerprintStore::open(temp_dir.path().join("db.json"))
                .await
                .unwrap(),
        );
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            store,
            Vec::new(),
            Arc::new(FfmpegScanner::default()),
        );

        let report = pipeline.run(temp_dir.path(), Vec::new()).await.unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.is_clean());
    }
}
