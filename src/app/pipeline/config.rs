//! Pipeline configuration

use serde::{Deserialize, Serialize};

use crate::constants::{hashing, staging, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for a scan run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// Ignore stored results and scan every file
    pub force_rescan: bool,
    /// Decide staleness on path and size only, skipping the up-front hash
    pub path_only: bool,
    /// Chunk size for staging copies
    pub copy_chunk_size: usize,
    /// Chunk size for content hashing
    pub hash_chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            force_rescan: false,
            path_only: false,
            copy_chunk_size: staging::COPY_CHUNK_SIZE,
            hash_chunk_size: hashing::HASH_CHUNK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_count == 0 || self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                field: "scan.worker_count".to_string(),
                value: self.worker_count.to_string(),
                reason: format!(
                    "Worker count must be between 1 and {}",
                    workers::MAX_WORKER_COUNT
                ),
            });
        }

        if self.copy_chunk_size == 0 || self.hash_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size".to_string(),
                value: "0".to_string(),
                reason: "Chunk sizes must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Scan every file regardless of stored results
    pub fn force_rescan(mut self, enabled: bool) -> Self {
        self.config.force_rescan = enabled;
        self
    }

    /// Skip the up-front content hash
    pub fn path_only(mut self, enabled: bool) -> Self {
        self.config.path_only = enabled;
        self
    }

    /// Set the staging copy chunk size
    pub fn copy_chunk_size(mut self, size: usize) -> Self {
        self.config.copy_chunk_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_count, 2);
        assert!(!config.force_rescan);
        assert!(!config.path_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        assert!(PipelineConfigBuilder::new().worker_count(0).build().is_err());
        assert!(PipelineConfigBuilder::new().worker_count(65).build().is_err());
        assert!(PipelineConfigBuilder::new().copy_chunk_size(0).build().is_err());

        let config = PipelineConfigBuilder::new()
            .worker_count(4)
            .force_rescan(true)
            .path_only(true)
            .build()
            .unwrap();
        assert_eq!(config.worker_count, 4);
        assert!(config.force_rescan);
        assert!(config.path_only);
    }
}
