//! Configuration management for vcheck
//!
//! Settings are layered: built-in defaults, then a TOML file, then command
//! line flags (applied by the CLI). Every section may be omitted from the
//! file, and every key within a section falls back to its default.
//!
//! ```toml
//! [scan]
//! worker_count = 4
//! database = "~/.vcheck.json"
//!
//! [staging]
//! tiers = ["/dev/shm", "/var/tmp/vcheck"]
//! safety_margin = 1.1
//!
//! [scanner]
//! ffmpeg = "/usr/bin/ffmpeg"
//! stall_interval = "30s"
//! max_stalled_intervals = 10
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{DiscoveryFilter, PipelineConfig, ScannerConfig, StagingConfig};
use crate::constants::{config as locations, discovery, store, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// What to scan and where results are kept
    pub scan: ScanConfigToml,
    /// Staging tiers
    pub staging: StagingConfig,
    /// External scanner
    pub scanner: ScannerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfigToml {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// Fingerprint database file, `~` expands to the home directory
    pub database: PathBuf,
    /// Ignore stored results and scan every file
    pub force_rescan: bool,
    /// Skip the up-front content hash
    pub path_only: bool,
    /// Video file extensions without the dot
    pub extensions: Vec<String>,
    /// Directory name prefixes to skip
    pub excluded_dir_prefixes: Vec<String>,
}

impl Default for ScanConfigToml {
    fn default() -> Self {
        let filter = DiscoveryFilter::default();
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            database: PathBuf::from("~").join(store::DEFAULT_DATABASE_FILE),
            force_rescan: false,
            path_only: false,
            extensions: filter.extensions,
            excluded_dir_prefixes: filter.excluded_dir_prefixes,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (`config_file_override`, or the first standard location that exists)
    ///
    /// Command line overrides are applied by the caller afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicitly requested file does not exist or
    /// any file found cannot be read or parsed.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(locations::LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let exists = path.exists();
            if exists {
                debug!("Found config file: {}", path.display());
            }
            exists
        })
    }

    /// The per-user config file path, e.g. `~/.config/vcheck/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(locations::CONFIG_DIR_NAME)
                .join(locations::CONFIG_FILE_NAME)
        })
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.pipeline_config().validate()?;
        self.staging.validate()?;
        self.scanner.validate()?;

        if self.scan.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.extensions".to_string(),
                value: "[]".to_string(),
                reason: "At least one extension is required".to_string(),
            });
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: "Expected one of error, warn, info, debug, trace".to_string(),
            });
        }

        Ok(())
    }

    /// Database path with `~` expanded and made absolute
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        resolve_path(&self.scan.database)
    }

    /// Runtime pipeline configuration
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            worker_count: self.scan.worker_count,
            force_rescan: self.scan.force_rescan,
            path_only: self.scan.path_only,
            copy_chunk_size: self.staging.chunk_size,
            ..PipelineConfig::default()
        }
    }

    /// Runtime discovery filter
    pub fn discovery_filter(&self) -> DiscoveryFilter {
        DiscoveryFilter {
            extensions: self
                .scan
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            excluded_dir_prefixes: self.scan.excluded_dir_prefixes.clone(),
        }
    }
}

/// Expand a leading `~` and make `path` absolute against the working directory
pub fn resolve_path(path: &Path) -> ConfigResult<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| ConfigError::NoHomeDirectory {
                path: path.to_path_buf(),
            })?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(&expanded))
        .map_err(|source| ConfigError::Read {
            path: expanded,
            source,
        })
}
