//! Catalog Loader CLI application
//!
//! Command-line interface for reconciling a dataset catalog into a collection
//! store and streaming entity resources into it.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, Level};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

use catalog_loader::cli::{handle_config, handle_load, handle_plan, Cli, Commands};
use catalog_loader::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
async fn run() -> anyhow::Result<ExitCode> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config.clone())
        .await
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_logging(&cli, &config);
    info!("Catalog Loader v{} starting", env!("CARGO_PKG_VERSION"));

    let show_progress = !cli.global.quiet;
    match cli.command {
        Commands::Load(args) => {
            info!("Executing load command");
            let summary = handle_load(args, &config, show_progress)
                .await
                .context("Load failed")?;
            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Plan(args) => {
            info!("Executing plan command");
            handle_plan(args, &config, show_progress)
                .await
                .context("Plan failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(args) => {
            handle_config(args, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize logging from CLI verbosity and the `[logging]` config table
fn init_logging(cli: &Cli, config: &AppConfig) {
    let log_level = cli.log_level(&config.logging.level);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.logging.colored_output)
        .with_level(log_level >= Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
