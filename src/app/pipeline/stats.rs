//! Scan run results

use std::time::Duration;

/// How one file's task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// A fresh stored result was reused
    CacheHit { status: bool },
    /// The scanner ran and its result was recorded
    Scanned { status: bool, diagnostics: Vec<String> },
    /// The task could not produce a result; nothing was recorded
    Failed { error: String },
}

impl FileOutcome {
    /// Whether the file counts as failed in the run summary
    pub fn is_failure(&self) -> bool {
        match self {
            FileOutcome::CacheHit { status } | FileOutcome::Scanned { status, .. } => !status,
            FileOutcome::Failed { .. } => true,
        }
    }
}

/// Outcome for one candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Path relative to the scan root
    pub path: String,
    /// How the task ended
    pub outcome: FileOutcome,
}

/// Results of a complete scan run, in completion order
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    files: Vec<FileReport>,
    elapsed: Duration,
}

impl ScanReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file's outcome
    pub fn push(&mut self, path: impl Into<String>, outcome: FileOutcome) {
        self.files.push(FileReport {
            path: path.into(),
            outcome,
        });
    }

    /// Set the wall-clock duration of the run
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Every file outcome
    pub fn files(&self) -> &[FileReport] {
        &self.files
    }

    /// Number of files processed
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Files answered from the fingerprint store
    pub fn cache_hits(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::CacheHit { .. }))
    }

    /// Files the scanner was run on
    pub fn scanned(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Scanned { .. }))
    }

    /// Files whose task ended in an error
    pub fn errors(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Failed { .. }))
    }

    /// Files known to be clean
    pub fn passed(&self) -> usize {
        self.total() - self.failed()
    }

    /// Files that are broken or could not be checked
    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failure)
    }

    /// Paths of failed files, sorted
    pub fn failed_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .files
            .iter()
            .filter(|file| file.outcome.is_failure())
            .map(|file| file.path.as_str())
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Share of failed files in percent, zero for an empty run
    pub fn failure_percentage(&self) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        self.failed() as f64 * 100.0 / self.total() as f64
    }

    /// Whether every file is known to be clean
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        format!(
            "{} of {} files failed ({:.1}%), {} scanned, {} from cache",
            self.failed(),
            self.total(),
            self.failure_percentage(),
            self.scanned(),
            self.cache_hits()
        )
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|file| predicate(&file.outcome)).count()
    }
}
