//! Error types for vcheck
//!
//! This module defines the error types for every component of the application.
//! Errors carry enough context (paths, sizes, tool output) to act on, and the
//! top-level [`AppError`] separates per-file failures from run-fatal ones.

use std::path::PathBuf;
use thiserror::Error;

/// Fingerprint database errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be read
    #[error("Failed to read fingerprint database {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file exists but is not a valid document
    #[error("Fingerprint database {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialising the in-memory store failed
    #[error("Failed to serialise fingerprint database")]
    Serialize(#[source] serde_json::Error),

    /// Writing the temporary file or replacing the database failed
    #[error("Atomic write failed: could not replace {final_path} with {temp_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A string that is not a 32-character MD5 hex digest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid hash format: {hash}. Expected MD5 hex string")]
pub struct InvalidHashError {
    pub hash: String,
}

/// Tier capacity accounting errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// A free did not match any outstanding reservation
    #[error(
        "Reservation accounting underflow on {tier}: freeing {requested} bytes with only {reserved} reserved"
    )]
    Underflow {
        tier: PathBuf,
        requested: u64,
        reserved: u64,
    },
}

/// Errors while making a file locally readable
#[derive(Error, Debug)]
pub enum StagingError {
    /// The source file could not be inspected
    #[error("Cannot stat source file {path}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying into a tier failed after the reservation was granted
    #[error("Failed to stage {source_path} into {staged_path}")]
    Copy {
        source_path: PathBuf,
        staged_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External scanner errors
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scanner process could not be started
    #[error("Failed to start scanner {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while feeding input or collecting output
    #[error("Scanner I/O error")]
    Io(#[from] std::io::Error),

    /// The scanner was terminated by a signal
    #[error("Scanner terminated unexpectedly")]
    Terminated,

    /// The scanner stopped consuming input and was killed
    #[error("Scanner stalled: no input consumed for {stalled_intervals} intervals of {interval_secs}s")]
    Stalled {
        stalled_intervals: u32,
        interval_secs: u64,
    },

    /// Remux precondition or tool failure
    #[error("Remux of {path} failed: {reason}")]
    Remux { path: PathBuf, reason: String },
}

/// Candidate discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The scan root does not exist or is not a directory
    #[error("Scan root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Directory traversal failed
    #[error("Directory traversal failed")]
    Walk(#[from] walkdir::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The user's home directory could not be determined
    #[error("Could not determine the home directory to expand {path}")]
    NoHomeDirectory { path: PathBuf },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A worker task panicked
    #[error("Worker {worker_id} panicked or terminated unexpectedly")]
    WorkerPanic { worker_id: usize },

    /// The run was interrupted by a shutdown signal
    #[error("Scan interrupted by shutdown signal")]
    Interrupted,
}

/// Errors that end a single file's task without affecting the rest of the run
#[derive(Error, Debug)]
pub enum TaskError {
    /// Staging failed
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Hashing the staged copy failed
    #[error("Failed to hash {path}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scanner failed to produce a result
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fingerprint database error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Capacity accounting error
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Staging error
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Scanner error
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Discovery error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Worker pool error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Per-file task error
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether this error ends the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::Staging(_) | AppError::Scan(_) | AppError::Task(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Store(_) => "store",
            AppError::Capacity(_) => "capacity",
            AppError::Staging(_) => "staging",
            AppError::Scan(_) => "scanner",
            AppError::Discovery(_) => "discovery",
            AppError::Config(_) => "config",
            AppError::Pipeline(_) => "pipeline",
            AppError::Task(_) => "task",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fingerprint database result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Staging result type alias
pub type StagingResult<T> = std::result::Result<T, StagingError>;

/// Scanner result type alias
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Per-file task result type alias
pub type TaskResult<T> = std::result::Result<T, TaskError>;
