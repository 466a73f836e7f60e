//! Tiered local staging
//!
//! Files on slow or remote storage are read more than once per task (hash,
//! then scan), so each one is first copied to the fastest configured tier
//! with room for it. Each tier has its own [`CapacityTracker`], and every
//! granted reservation is owned by the [`StagedFile`] that needed it.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vcheck::app::progress::NoProgress;
//! use vcheck::app::staging::{CapacityTracker, StagedFile};
//!
//! # async fn example() -> vcheck::errors::StagingResult<()> {
//! let tiers = vec![Arc::new(CapacityTracker::new("/dev/shm"))];
//! let staged = StagedFile::acquire("video.mkv".as_ref(), &tiers, 8192, &NoProgress).await?;
//! println!("reading from {}", staged.path().display());
//! // Dropping `staged` deletes the copy and frees the reservation
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod staged;
pub mod tracker;

pub use config::StagingConfig;
pub use staged::{StagedCopy, StagedFile};
pub use tracker::{CapacityTracker, FixedSpaceProbe, FsSpaceProbe, SpaceProbe};
