//! Command handlers for the vcheck CLI
//!
//! This module implements the command handlers that turn parsed arguments and
//! the loaded [`AppConfig`] into core application calls. Each handler returns
//! the process exit code; only fatal errors are returned as `Err`.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::app::pipeline::{create_shutdown_channel, SignalHandler};
use crate::app::{
    discover, remux, FfmpegScanner, FingerprintEntry, FingerprintStore, Pipeline, ProgressSink,
    ScanReport,
};
use crate::cli::args::{RemuxArgs, ScanArgs};
use crate::config::{resolve_path, AppConfig};
use crate::constants::exit;
use crate::errors::Result;

/// Scan (or rescan) every video file under `args.videodir`
///
/// With `rescan` set, failed entries for the discovered files are forgotten
/// first so they are decoded again.
///
/// # Errors
///
/// Returns `AppError` if discovery, the store or the worker pool fails as a
/// whole, or the run is interrupted.
pub async fn handle_scan(
    args: &ScanArgs,
    rescan: bool,
    config: &AppConfig,
    progress: Arc<dyn ProgressSink>,
) -> Result<i32> {
    let root = resolve_path(&args.videodir)?;
    info!("Scanning {}", root.display());

    let files = discover(&root, &config.discovery_filter())?;
    info!("Found {} video files", files.len());

    let store = Arc::new(FingerprintStore::open(config.database_path()?).await?);
    let tiers = config.staging.build_trackers();
    for tier in &tiers {
        debug!(
            "Staging tier {} has {} bytes free",
            tier.root().display(),
            tier.live_free_space()
        );
    }

    let pipeline = Pipeline::new(
        config.pipeline_config(),
        store,
        tiers,
        Arc::new(FfmpegScanner::new(config.scanner.clone())),
    )
    .with_progress(progress);

    if rescan {
        let forgotten = pipeline.forget_failed(&files).await?;
        info!("Forgot {} previously failed files", forgotten);
    }

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signals = SignalHandler::new(shutdown_tx).setup();
    let result = pipeline.run_until_shutdown(&root, files, shutdown_rx).await;
    signals.abort();

    let report = result?;
    write_report(&mut io::stdout().lock(), &report)?;

    Ok(if report.is_clean() {
        exit::SUCCESS
    } else {
        exit::FILES_FAILED
    })
}

/// Print every file recorded as broken, sorted by path
///
/// # Errors
///
/// Returns `AppError` if the store cannot be opened.
pub async fn handle_show(config: &AppConfig, verbose: bool) -> Result<i32> {
    let store = FingerprintStore::open(config.database_path()?).await?;
    let failed = store.failed().await;
    debug!("{} of {} entries failed", failed.len(), store.len().await);

    write_broken_files(&mut io::stdout().lock(), &failed, verbose)?;
    Ok(exit::SUCCESS)
}

/// Remux each file in place, continuing past failures
///
/// # Errors
///
/// Never fails as a whole; per-file failures are logged and reflected in the
/// exit code.
pub async fn handle_remux(args: &RemuxArgs, config: &AppConfig) -> Result<i32> {
    let mut failures = 0usize;

    for file in &args.files {
        match remux(file, &config.scanner.ffmpeg).await {
            Ok(diagnostics) if diagnostics.is_empty() => {
                info!("Remuxed {}", file.display());
            }
            Ok(diagnostics) => {
                warn!(
                    "Remuxed {} with {} diagnostics",
                    file.display(),
                    diagnostics.len()
                );
            }
            Err(e) => {
                error!("{}", e);
                failures += 1;
            }
        }
    }

    Ok(if failures == 0 {
        exit::SUCCESS
    } else {
        exit::FILES_FAILED
    })
}

fn write_report(out: &mut impl Write, report: &ScanReport) -> io::Result<()> {
    let failed = report.failed_paths();
    if !failed.is_empty() {
        writeln!(out, "Broken Files:")?;
        for path in failed {
            writeln!(out, "{}", path)?;
        }
    }
    writeln!(out, "{} in {:.1?}", report.summary(), report.elapsed())
}

fn write_broken_files(
    out: &mut impl Write,
    failed: &[FingerprintEntry],
    verbose: bool,
) -> io::Result<()> {
    writeln!(out, "Broken Files:")?;
    for entry in failed {
        writeln!(out, "{}", entry.path)?;
        if verbose {
            for line in &entry.diagnostics {
                writeln!(out, "    {}", line)?;
            }
        }
    }
    Ok(())
}
