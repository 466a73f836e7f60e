//! Per-tier space reservation
//!
//! A [`CapacityTracker`] accounts for bytes reserved on one staging tier and
//! grants a reservation only while the tier's live free space, minus what is
//! already reserved, covers the request plus a safety margin.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error};

use crate::constants::staging;
use crate::errors::CapacityError;

/// Source of live free-space readings for a tier
pub trait SpaceProbe: Send + Sync + fmt::Debug {
    /// Bytes currently available to unprivileged writers under `path`
    fn available_space(&self, path: &Path) -> u64;
}

/// Reads free space from the filesystem on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn available_space(&self, path: &Path) -> u64 {
        match fs2::available_space(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cannot read free space of {}: {}", path.display(), e);
                0
            }
        }
    }
}

/// Reports a constant amount of free space
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub u64);

impl SpaceProbe for FixedSpaceProbe {
    fn available_space(&self, _path: &Path) -> u64 {
        self.0
    }
}

/// Reserved-bytes accounting for one staging tier
#[derive(Debug)]
pub struct CapacityTracker {
    root: PathBuf,
    reserved: Mutex<u64>,
    probe: Box<dyn SpaceProbe>,
    safety_margin: f64,
}

impl CapacityTracker {
    /// Create a tracker for `root` backed by live filesystem readings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_probe(root, FsSpaceProbe)
    }

    /// Create a tracker for `root` with a custom free-space probe
    pub fn with_probe(root: impl Into<PathBuf>, probe: impl SpaceProbe + 'static) -> Self {
        Self {
            root: root.into(),
            reserved: Mutex::new(0),
            probe: Box::new(probe),
            safety_margin: staging::SAFETY_MARGIN,
        }
    }

    /// Set the free space required per reserved byte
    pub fn with_safety_margin(mut self, safety_margin: f64) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Root directory staged copies are written to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes currently reserved on this tier
    pub fn reserved_bytes(&self) -> u64 {
        *self.lock()
    }

    /// Live free space of the tier, zero if the root is not a directory
    pub fn live_free_space(&self) -> u64 {
        if !self.root.is_dir() {
            return 0;
        }
        self.probe.available_space(&self.root)
    }

    /// Try to reserve `size` bytes
    ///
    /// The request is granted only if the live free space minus the bytes
    /// already reserved covers `size` times the safety margin. Only `size`
    /// itself is added to the reserved total. Returns `false` without any
    /// state change otherwise.
    pub fn reserve(&self, size: u64) -> bool {
        let mut reserved = self.lock();
        let available = self.live_free_space().saturating_sub(*reserved);
        let required = self.required_space(size);

        if available < required {
            debug!(
                "Tier {} denied {} bytes: {} available, {} required",
                self.root.display(),
                size,
                available,
                required
            );
            return false;
        }

        *reserved += size;
        debug!(
            "Tier {} reserved {} bytes ({} outstanding)",
            self.root.display(),
            size,
            *reserved
        );
        true
    }

    /// Release `size` bytes previously granted by [`reserve`](Self::reserve)
    ///
    /// # Errors
    ///
    /// Returns `CapacityError::Underflow` and leaves the total untouched if
    /// fewer than `size` bytes are reserved.
    pub fn free(&self, size: u64) -> Result<(), CapacityError> {
        let mut reserved = self.lock();
        if size > *reserved {
            error!(
                "Tier {} asked to free {} bytes with only {} reserved",
                self.root.display(),
                size,
                *reserved
            );
            return Err(CapacityError::Underflow {
                tier: self.root.clone(),
                requested: size,
                reserved: *reserved,
            });
        }

        *reserved -= size;
        Ok(())
    }

    // Margin applied in thousandths so that e.g. 1.1 * 5000 is exactly 5500
    fn required_space(&self, size: u64) -> u64 {
        let permille = (self.safety_margin * 1000.0).round().max(0.0) as u128;
        let required = (size as u128 * permille).div_ceil(1000);
        u64::try_from(required).unwrap_or(u64::MAX)
    }

    // Every mutation is a single arithmetic step, so a poisoned total is still consistent
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tracker(temp_dir: &TempDir, free: u64) -> CapacityTracker {
        CapacityTracker::with_probe(temp_dir.path(), FixedSpaceProbe(free))
    }

    #[test]
    fn test_reserve_respects_safety_margin() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 10_000);

        assert!(!tracker.reserve(9_500));
        assert_eq!(tracker.reserved_bytes(), 0);

        assert!(tracker.reserve(5_000));
        assert_eq!(tracker.reserved_bytes(), 5_000);

        // 5000 left, 1.1 * 5000 does not fit
        assert!(!tracker.reserve(5_000));
        assert!(tracker.reserve(4_000));
        assert_eq!(tracker.reserved_bytes(), 9_000);
    }

    #[test]
    fn test_free_returns_to_previous_total() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 1_000_000);

        assert!(tracker.reserve(300));
        let before = tracker.reserved_bytes();
        assert!(tracker.reserve(1234));
        tracker.free(1234).unwrap();
        assert_eq!(tracker.reserved_bytes(), before);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 1_000_000);

        assert!(tracker.reserve(100));
        tracker.free(100).unwrap();

        let err = tracker.free(100).unwrap_err();
        assert_eq!(
            err,
            CapacityError::Underflow {
                tier: temp_dir.path().to_path_buf(),
                requested: 100,
                reserved: 0,
            }
        );
        assert_eq!(tracker.reserved_bytes(), 0);
    }

    #[test]
    fn test_missing_tier_has_no_space() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = CapacityTracker::with_probe(
            temp_dir.path().join("does-not-exist"),
            FixedSpaceProbe(u64::MAX),
        );

        assert_eq!(tracker.live_free_space(), 0);
        assert!(!tracker.reserve(1));
    }

    #[test]
    fn test_zero_byte_reservation() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 0);

        assert!(tracker.reserve(0));
        tracker.free(0).unwrap();
        assert_eq!(tracker.reserved_bytes(), 0);
    }

    #[test]
    fn test_margin_boundary_is_inclusive() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 5_500);

        assert!(!tracker.reserve(5_001));
        assert!(tracker.reserve(5_000));
    }

    #[test]
    fn test_custom_safety_margin() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker(&temp_dir, 2_000).with_safety_margin(2.0);

        assert!(!tracker.reserve(1_001));
        assert!(tracker.reserve(1_000));
    }

    #[test]
    fn test_filesystem_probe_reports_space() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = CapacityTracker::new(temp_dir.path());
        assert!(tracker.live_free_space() > 0);
    }

    #[test]
    fn test_concurrent_reservations_never_oversubscribe() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = Arc::new(tracker(&temp_dir, 100_000));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    let mut granted = 0u64;
                    for _ in 0..200 {
                        if tracker.reserve(1_000) {
                            assert!(tracker.reserved_bytes() <= 100_000);
                            granted += 1;
                        }
                    }
                    granted
                })
            })
            .collect();

        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // At 98000 reserved, 2000 free still covers 1100; at 99000 it does not
        assert_eq!(granted, 99);
        assert_eq!(tracker.reserved_bytes(), 99_000);
    }
}
