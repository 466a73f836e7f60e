//! Scanner output filtering
//!
//! Pure text transformations shared by the scanner and the remux utility.

use crate::constants::{IGNORED_DIAGNOSTICS, MAX_DIAGNOSTIC_LINES};

/// Whether `line` contains a known-benign diagnostic
pub fn is_ignored(line: &str) -> bool {
    IGNORED_DIAGNOSTICS
        .iter()
        .any(|benign| line.contains(benign))
}

/// Split tool output into trimmed lines, dropping blank and known-benign ones
pub fn filter_diagnostics(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_ignored(line))
        .map(str::to_string)
        .collect()
}

/// Keep at most the first [`MAX_DIAGNOSTIC_LINES`] lines
pub fn truncate_diagnostics(mut lines: Vec<String>) -> Vec<String> {
    lines.truncate(MAX_DIAGNOSTIC_LINES);
    lines
}
