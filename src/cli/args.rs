//! Command-line argument parsing for vcheck
//!
//! This module defines the CLI structure using clap derive macros. Global
//! options map onto [`AppConfig`] fields and override whatever the config file
//! provided.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

/// vcheck - find broken video files without decoding the same file twice
#[derive(Parser, Debug)]
#[command(
    name = "vcheck",
    version,
    about = "Check a video library for decode errors, remembering results between runs",
    long_about = "Decodes every video file under a directory with ffmpeg and records the outcome in a
fingerprint database keyed by path, size and MD5. Unchanged files are skipped on later runs.
Files on slow storage can be staged into fast local directories (tiers) before decoding."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Debug logging; disables progress bars
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Number of scan workers
    #[arg(short = 'n', long, global = true, value_name = "N")]
    pub nthreads: Option<usize>,

    /// Fingerprint database path
    #[arg(short = 'd', long, global = true, value_name = "FILE")]
    pub dbpath: Option<PathBuf>,

    /// Ignore cached results and decode every file again
    #[arg(short = 'f', long, global = true)]
    pub force_rescan: bool,

    /// Match cached results on path and size only, skipping the MD5 unless a scan is needed
    #[arg(short = 'p', long, global = true)]
    pub path_only: bool,

    /// Staging directory, fastest first; repeat to add more tiers
    #[arg(short = 't', long = "tier", global = true, value_name = "DIR")]
    pub tiers: Vec<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan every video file under a directory
    Scan(ScanArgs),

    /// Forget previous failures under a directory, then scan it
    Rescan(ScanArgs),

    /// List files recorded as broken
    Show,

    /// Rewrite files through ffmpeg stream copy, replacing them in place
    Remux(RemuxArgs),
}

/// Arguments for the scan and rescan commands
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Root directory of the video library
    #[arg(value_name = "VIDEODIR")]
    pub videodir: PathBuf,
}

/// Arguments for the remux command
#[derive(Args, Debug, Clone)]
pub struct RemuxArgs {
    /// Files to remux
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Get the logging level forced by global arguments, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.verbose {
            Some(tracing::Level::DEBUG)
        } else {
            None
        }
    }

    /// Progress bars are drawn unless debug output would interleave with them
    pub fn wants_progress_bars(&self) -> bool {
        !self.global.verbose && !self.global.quiet
    }

    /// Apply command line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        let global = &self.global;

        if let Some(level) = self.log_level() {
            config.logging.level = level.to_string().to_lowercase();
        }
        if let Some(nthreads) = global.nthreads {
            config.scan.worker_count = nthreads;
        }
        if let Some(dbpath) = &global.dbpath {
            config.scan.database = dbpath.clone();
        }
        if !global.tiers.is_empty() {
            config.staging.tiers = global.tiers.clone();
        }
        config.scan.force_rescan |= global.force_rescan;
        config.scan.path_only |= global.path_only;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_log_level() {
        let cli = parse(&["vcheck", "show"]);
        assert_eq!(cli.log_level(), None);
        assert!(cli.wants_progress_bars());

        let cli = parse(&["vcheck", "-v", "show"]);
        assert_eq!(cli.log_level(), Some(tracing::Level::DEBUG));
        assert!(!cli.wants_progress_bars());

        let cli = parse(&["vcheck", "show", "--quiet"]);
        assert_eq!(cli.log_level(), Some(tracing::Level::ERROR));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["vcheck", "-v", "-q", "show"]).is_err());
    }

    #[test]
    fn test_scan_requires_directory() {
        assert!(Cli::try_parse_from(["vcheck", "scan"]).is_err());

        let cli = parse(&["vcheck", "scan", "/media/videos"]);
        match cli.command {
            Commands::Scan(args) => assert_eq!(args.videodir, PathBuf::from("/media/videos")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_remux_requires_files() {
        assert!(Cli::try_parse_from(["vcheck", "remux"]).is_err());

        let cli = parse(&["vcheck", "remux", "a.mkv", "b.mp4"]);
        match cli.command {
            Commands::Remux(args) => assert_eq!(args.files.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["vcheck", "frobnicate"]).is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = parse(&[
            "vcheck",
            "rescan",
            "/videos",
            "-n",
            "6",
            "-d",
            "/tmp/db.json",
            "-t",
            "/dev/shm",
            "-t",
            "/var/tmp",
            "-f",
            "-p",
            "-v",
        ]);

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.scan.worker_count, 6);
        assert_eq!(config.scan.database, PathBuf::from("/tmp/db.json"));
        assert_eq!(
            config.staging.tiers,
            vec![PathBuf::from("/dev/shm"), PathBuf::from("/var/tmp")]
        );
        assert!(config.scan.force_rescan);
        assert!(config.scan.path_only);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_overrides_keep_config_values() {
        let cli = parse(&["vcheck", "show"]);

        let mut config = AppConfig::default();
        config.scan.worker_count = 3;
        config.staging.tiers = vec![PathBuf::from("/scratch")];
        config.logging.level = "warn".to_string();
        cli.apply_overrides(&mut config);

        assert_eq!(config.scan.worker_count, 3);
        assert_eq!(config.staging.tiers, vec![PathBuf::from("/scratch")]);
        assert_eq!(config.logging.level, "warn");
        assert!(!config.scan.force_rescan);
    }
}
