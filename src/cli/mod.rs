//! Command-line interface components
//!
//! This module contains CLI-specific code for vcheck: argument parsing, the
//! terminal progress display and the command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, GlobalArgs, RemuxArgs, ScanArgs};
pub use commands::{handle_remux, handle_scan, handle_show};
pub use progress::{LogWriter, ProgressConfig, ProgressDisplay};
