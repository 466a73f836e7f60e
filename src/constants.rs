//! Application constants for vcheck
//!
//! This module centralizes the constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Fingerprint database constants
pub mod store {
    /// Default database file name, placed in the user's home directory
    pub const DEFAULT_DATABASE_FILE: &str = ".vcheck.json";

    /// Suffix of the temporary file written before the atomic rename
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Maximum number of diagnostic lines kept per failed entry
    pub const MAX_DIAGNOSTIC_LINES: usize = 10;
}

/// Staging tier constants
pub mod staging {
    /// Default staging tier (RAM-backed on Linux)
    pub const DEFAULT_TIER: &str = "/dev/shm";

    /// Free space required per reserved byte
    pub const SAFETY_MARGIN: f64 = 1.1;

    /// Copy chunk size
    pub const COPY_CHUNK_SIZE: usize = 8 * 1024;
}

/// Hashing constants
pub mod hashing {
    /// Read chunk size for content hashing
    pub const HASH_CHUNK_SIZE: usize = 8 * 1024;
}

/// External scanner constants
pub mod scanner {
    use super::Duration;

    /// Default scanner binary
    pub const DEFAULT_FFMPEG: &str = "ffmpeg";

    /// Chunk size used when feeding the scanner's stdin
    pub const FEED_CHUNK_SIZE: usize = 32 * 1024;

    /// Interval between stall-detector observations
    pub const STALL_INTERVAL: Duration = Duration::from_secs(30);

    /// Consecutive observations without progress before the scanner is killed
    pub const MAX_STALLED_INTERVALS: u32 = 10;

    /// Known-benign diagnostics that never indicate a broken file
    pub const IGNORED_DIAGNOSTICS: &[&str] =
        &["Application provided invalid, non monotonically increasing dts to muxer"];
}

/// Discovery constants
pub mod discovery {
    /// Video file extensions considered for scanning
    pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

    /// Directories whose names start with one of these prefixes are skipped
    pub const EXCLUDED_DIR_PREFIXES: &[&str] = &["@"];
}

/// Worker configuration
pub mod workers {
    /// Default number of scan workers
    pub const DEFAULT_WORKER_COUNT: usize = 2;

    /// Maximum number of scan workers
    pub const MAX_WORKER_COUNT: usize = 64;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "vcheck.toml";

    /// Directory name under the user's config directory
    pub const CONFIG_DIR_NAME: &str = "vcheck";

    /// Configuration file name under [`CONFIG_DIR_NAME`]
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Process exit codes
pub mod exit {
    /// Every checked file passed
    pub const SUCCESS: i32 = 0;

    /// Fatal error, interrupted run or invalid usage
    pub const ERROR: i32 = 1;

    /// The run completed but at least one file failed
    pub const FILES_FAILED: i32 = 3;
}

pub use scanner::IGNORED_DIAGNOSTICS;
pub use store::MAX_DIAGNOSTIC_LINES;
pub use workers::DEFAULT_WORKER_COUNT;
