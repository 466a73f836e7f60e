//! Fingerprint store
//!
//! Remembers the last scan result of every file, keyed by its path relative to
//! the scan root, together with the content hash and size observed at that
//! time. A stored result is only reused while the live file still matches.

pub mod database;
pub mod entry;

pub use database::FingerprintStore;
pub use entry::FingerprintEntry;
