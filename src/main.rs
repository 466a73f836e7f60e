//! vcheck CLI application
//!
//! Command-line interface for checking video libraries for decode errors.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use vcheck::cli::{
    handle_remux, handle_scan, handle_show, Cli, Commands, LogWriter, ProgressConfig,
    ProgressDisplay,
};
use vcheck::config::AppConfig;
use vcheck::constants::exit;
use vcheck::errors::Result;

#[tokio::main]
async fn main() {
    let code = run().await;
    process::exit(code);
}

/// Main application logic, returning the process exit code
async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and are not errors
            let code = if e.use_stderr() {
                exit::ERROR
            } else {
                exit::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit::ERROR;
        }
    };

    let display = Arc::new(ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: cli.wants_progress_bars(),
    }));
    init_logging(&config, display.log_writer());

    info!("vcheck v{} starting", env!("CARGO_PKG_VERSION"));

    match execute(&cli, &config, display).await {
        Ok(code) => code,
        Err(e) => {
            error!("{} error: {}", e.category(), e);
            exit::ERROR
        }
    }
}

/// Config file, then command line overrides, then validation
async fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.global.config.clone()).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn execute(cli: &Cli, config: &AppConfig, display: Arc<ProgressDisplay>) -> Result<i32> {
    match &cli.command {
        Commands::Scan(args) => {
            debug!("Executing scan command");
            handle_scan(args, false, config, display).await
        }
        Commands::Rescan(args) => {
            debug!("Executing rescan command");
            handle_scan(args, true, config, display).await
        }
        Commands::Show => handle_show(config, cli.global.verbose).await,
        Commands::Remux(args) => {
            debug!("Executing remux command");
            handle_remux(args, config).await
        }
    }
}

/// Initialize logging to stderr at the configured level
fn init_logging(config: &AppConfig, writer: LogWriter) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("vcheck={}", config.logging.level).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer)
        .init();
}
