//! Terminal progress display for scan runs
//!
//! [`ProgressDisplay`] implements the core's [`ProgressSink`] with indicatif:
//! one overall bar counting finished files and one byte bar per worker showing
//! the current stage (cache copy, md5, ffmpeg). Log lines are routed through
//! [`ProgressDisplay::log_writer`] so they are printed above the bars instead
//! of tearing them.
//!
//! # Examples
//!
//! ```rust
//! use vcheck::app::ProgressSink;
//! use vcheck::cli::{ProgressConfig, ProgressDisplay};
//!
//! let display = ProgressDisplay::new(ProgressConfig {
//!     enable_progress_bars: false,
//! });
//! display.start(3, 2);
//! let worker = display.worker(0);
//! worker.set_label("md5");
//! worker.reset(1024);
//! worker.update(512);
//! display.file_finished("show/episode1.mkv", false);
//! display.finish();
//! ```

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;
use tracing_subscriber::fmt::MakeWriter;

use crate::app::{ProgressReporter, ProgressSink};

const MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";
const WORKER_TEMPLATE: &str =
    "  Worker {prefix}: {msg:>6} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
        }
    }
}

#[derive(Debug)]
struct Bars {
    main: ProgressBar,
    workers: Vec<ProgressBar>,
}

/// indicatif-backed progress sink
#[derive(Debug)]
pub struct ProgressDisplay {
    multi: MultiProgress,
    enabled: bool,
    bars: Mutex<Option<Bars>>,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    ///
    /// Bars are only drawn when enabled and stderr is a terminal.
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let enabled = config.enable_progress_bars && is_terminal;

        let multi = if enabled {
            MultiProgress::with_draw_target(ProgressDrawTarget::stderr())
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        Self {
            multi,
            enabled,
            bars: Mutex::new(None),
        }
    }

    /// Whether bars are actually drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Writer for the tracing subscriber that prints above the bars
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            multi: self.multi.clone(),
        }
    }

    fn bars(&self) -> MutexGuard<'_, Option<Bars>> {
        self.bars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn main_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(MAIN_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }

    fn worker_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(WORKER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl ProgressSink for ProgressDisplay {
    fn start(&self, total_files: usize, worker_count: usize) {
        let main = self.multi.add(ProgressBar::new(total_files as u64));
        main.set_style(Self::main_style());

        let workers = (0..worker_count)
            .map(|id| {
                let bar = self.multi.add(ProgressBar::new(0));
                bar.set_style(Self::worker_style());
                bar.set_prefix((id + 1).to_string());
                bar.set_message("idle");
                bar
            })
            .collect();

        *self.bars() = Some(Bars { main, workers });
        debug!(
            "Progress display started for {} files with {} workers",
            total_files, worker_count
        );
    }

    fn worker(&self, worker_id: usize) -> Arc<dyn ProgressReporter> {
        let bar = self
            .bars()
            .as_ref()
            .and_then(|bars| bars.workers.get(worker_id).cloned())
            .unwrap_or_else(ProgressBar::hidden);
        Arc::new(WorkerBar { bar })
    }

    fn file_finished(&self, path: &str, failed: bool) {
        if let Some(bars) = self.bars().as_ref() {
            bars.main.inc(1);
            if failed {
                bars.main.set_message(format!("last failure: {}", path));
            }
        }
    }

    fn finish(&self) {
        if let Some(bars) = self.bars().take() {
            for worker in &bars.workers {
                worker.finish_and_clear();
            }
            bars.main.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

/// One worker's byte bar
#[derive(Debug)]
struct WorkerBar {
    bar: ProgressBar,
}

impl ProgressReporter for WorkerBar {
    fn set_label(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn reset(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn update(&self, delta: u64) {
        self.bar.inc(delta);
    }
}

/// stderr writer that suspends the progress bars while a log line is printed
#[derive(Debug, Clone)]
pub struct LogWriter {
    multi: MultiProgress,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.multi.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
