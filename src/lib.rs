//! vcheck Library
//!
//! Incremental decode-error checking for large video libraries. Every file is
//! decoded by an external scanner at most once per content version: results
//! are kept in a fingerprint database keyed by path, size and MD5, and files on
//! slow storage are staged into fast local tiers before they are read.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
