//! Staging tier configuration

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::staging;
use crate::errors::{ConfigError, ConfigResult};

use super::tracker::CapacityTracker;

/// Configuration for the staging tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Tier roots, fastest first
    pub tiers: Vec<PathBuf>,
    /// Free space required per reserved byte
    pub safety_margin: f64,
    /// Copy chunk size in bytes
    pub chunk_size: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            tiers: vec![PathBuf::from(staging::DEFAULT_TIER)],
            safety_margin: staging::SAFETY_MARGIN,
            chunk_size: staging::COPY_CHUNK_SIZE,
        }
    }
}

impl StagingConfig {
    /// Replace the tier list
    pub fn with_tiers(mut self, tiers: Vec<PathBuf>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Set the safety margin
    pub fn with_safety_margin(mut self, safety_margin: f64) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.safety_margin.is_finite() || self.safety_margin < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "staging.safety_margin".to_string(),
                value: self.safety_margin.to_string(),
                reason: "Safety margin must be at least 1.0".to_string(),
            });
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "staging.chunk_size".to_string(),
                value: "0".to_string(),
                reason: "Chunk size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// One tracker per configured tier, in priority order
    pub fn build_trackers(&self) -> Vec<Arc<CapacityTracker>> {
        self.tiers
            .iter()
            .map(|root| {
                Arc::new(CapacityTracker::new(root.clone()).with_safety_margin(self.safety_margin))
            })
            .collect()
    }
}
