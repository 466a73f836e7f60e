//! ffmpeg-backed scanner with stall detection
//!
//! The file is streamed into `ffmpeg -f null` through stdin so the decoder
//! reads the staged copy exactly once. While input is being fed, a monitor
//! watches how many bytes ffmpeg has accepted; if that count does not move
//! for a configured number of consecutive intervals the process is killed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::progress::ProgressReporter;
use crate::constants::scanner;
use crate::errors::{ConfigError, ConfigResult, ScanError, ScanResult};

use super::filter::filter_diagnostics;
use super::{ScanOutcome, Scanner};

/// Decode the whole input and discard the result, printing only errors
const SCAN_ARGS: &[&str] = &[
    "-loglevel",
    "error",
    "-i",
    "-",
    "-max_muxing_queue_size",
    "400",
    "-f",
    "null",
    "-",
];

/// Configuration for the external scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// ffmpeg executable, looked up on `PATH` if not absolute
    pub ffmpeg: PathBuf,
    /// Bytes written to ffmpeg's stdin per chunk
    pub chunk_size: usize,
    /// Time between stall observations
    #[serde(with = "humantime_serde")]
    pub stall_interval: Duration,
    /// Consecutive observations without progress before ffmpeg is killed
    pub max_stalled_intervals: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from(scanner::DEFAULT_FFMPEG),
            chunk_size: scanner::FEED_CHUNK_SIZE,
            stall_interval: scanner::STALL_INTERVAL,
            max_stalled_intervals: scanner::MAX_STALLED_INTERVALS,
        }
    }
}

impl ScannerConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanner.chunk_size".to_string(),
                value: "0".to_string(),
                reason: "Chunk size must be greater than zero".to_string(),
            });
        }

        if self.stall_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "scanner.stall_interval".to_string(),
                value: "0s".to_string(),
                reason: "Stall interval must be greater than zero".to_string(),
            });
        }

        if self.max_stalled_intervals == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanner.max_stalled_intervals".to_string(),
                value: "0".to_string(),
                reason: "At least one stalled interval must be allowed".to_string(),
            });
        }

        Ok(())
    }
}

/// Scanner that pipes the file through ffmpeg
#[derive(Debug, Clone, Default)]
pub struct FfmpegScanner {
    config: ScannerConfig,
}

impl FfmpegScanner {
    /// Create a new scanner
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Get the scanner configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    fn program(&self) -> String {
        self.config.ffmpeg.display().to_string()
    }
}

#[async_trait]
impl Scanner for FfmpegScanner {
    async fn scan(&self, path: &Path, progress: &dyn ProgressReporter) -> ScanResult<ScanOutcome> {
        debug!("Running ffmpeg for {}", path.display());

        let mut input = File::open(path).await?;
        let total = input.metadata().await?.len();
        progress.set_label("ffmpeg");
        progress.reset(total);

        let mut child = Command::new(&self.config.ffmpeg)
            .args(SCAN_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScanError::Spawn {
                program: self.program(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let consumed = AtomicU64::new(0);
        let stalled = tokio::select! {
            fed = feed(&mut input, stdin, self.config.chunk_size, &consumed, progress) => {
                fed?;
                false
            }
            _ = watch_for_stall(&consumed, self.config.stall_interval, self.config.max_stalled_intervals) => true,
        };

        if stalled {
            warn!(
                "ffmpeg stalled on {} after {} bytes, killing it",
                path.display(),
                consumed.load(Ordering::Relaxed)
            );
            let _ = child.kill().await;
            return Err(ScanError::Stalled {
                stalled_intervals: self.config.max_stalled_intervals,
                interval_secs: self.config.stall_interval.as_secs(),
            });
        }

        let status = child.wait().await?;
        let mut output = collect(stdout).await?;
        output.push_str(&collect(stderr).await?);

        let mut diagnostics = filter_diagnostics(&output);
        match status.code() {
            None => return Err(ScanError::Terminated),
            Some(0) => {}
            Some(code) if diagnostics.is_empty() => {
                diagnostics.push(format!("scanner exited with status {}", code));
            }
            Some(_) => {}
        }

        let outcome = ScanOutcome::from_diagnostics(diagnostics);
        debug!(
            "ffmpeg finished {}: success={}",
            path.display(),
            outcome.success
        );
        Ok(outcome)
    }
}

/// Stream `input` into the child's stdin, then close it
///
/// A closed pipe means the decoder gave up early; its own output explains why.
async fn feed(
    input: &mut File,
    stdin: Option<ChildStdin>,
    chunk_size: usize,
    consumed: &AtomicU64,
    progress: &dyn ProgressReporter,
) -> ScanResult<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let read = input.read(&mut buffer).await?;
        if read == 0 {
            break;
        }

        match stdin.write_all(&buffer[..read]).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("Scanner closed its input early");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        consumed.fetch_add(read as u64, Ordering::Relaxed);
        progress.update(read as u64);
    }

    match stdin.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e.into()),
        _ => Ok(()),
    }
}

/// Resolve once `consumed` has not moved for `max_stalled` consecutive ticks
async fn watch_for_stall(consumed: &AtomicU64, interval: Duration, max_stalled: u32) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    let mut last_seen = consumed.load(Ordering::Relaxed);
    let mut stalled = 0u32;
    loop {
        ticker.tick().await;
        let now = consumed.load(Ordering::Relaxed);
        if now == last_seen {
            stalled += 1;
            debug!("No scanner progress for {} interval(s)", stalled);
            if stalled >= max_stalled {
                return;
            }
        } else {
            stalled = 0;
            last_seen = now;
        }
    }
}

fn drain<R>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Ok(buffer)
    })
}

async fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> ScanResult<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };

    let bytes = handle
        .await
        .map_err(|e| std::io::Error::new(ErrorKind::Other, e))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
