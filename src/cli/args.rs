//! Command-line argument parsing for the catalog loader
//!
//! This module defines the CLI structure using clap derive macros: loading a
//! catalog into the collection store, planning a load without touching the
//! store, and managing the configuration file.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::app::catalog::DatasetFilter;
use crate::config::AppConfig;

/// Catalog Loader - reconcile a dataset catalog into a collection store
#[derive(Parser, Debug)]
#[command(
    name = "catalog_loader",
    version,
    about = "Reconcile a dataset catalog into a collection store",
    long_about = "Walks a JSON catalog manifest, creates or updates one collection per dataset and
streams each dataset's structured-entity resources into it."
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
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile collections and load their entities
    Load(LoadArgs),

    /// Show which datasets a load would reconcile, without calling the store
    Plan(CatalogArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Catalog selection shared by `load` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Catalog manifest URL (falls back to catalog.url in the config)
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,

    /// Dataset name to skip; may be repeated
    #[arg(short, long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Dataset name to load; may be repeated. When given, nothing else is loaded
    #[arg(short, long = "include", value_name = "NAME")]
    pub include: Vec<String>,
}

/// Arguments for the load command
#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Frequency for datasets that do not declare one
    #[arg(short, long, value_name = "FREQUENCY")]
    pub frequency: Option<String>,

    /// Only reconcile collection metadata; do not stream entities
    #[arg(long)]
    pub metadata_only: bool,

    /// Abort the run after this long, e.g. "30m" or "2h"
    #[arg(long, value_name = "DURATION", value_parser = parse_deadline)]
    pub deadline: Option<Duration>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Where to write the file (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

fn parse_deadline(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging filter level
    ///
    /// Command-line flags win; without any, `configured` (the `[logging]`
    /// level) is used when it names a valid level.
    pub fn log_level(&self, configured: &str) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            configured.parse().unwrap_or(tracing::Level::WARN)
        }
    }
}

impl CatalogArgs {
    /// Catalog URL from the command line, else from the config
    pub fn resolve_url(&self, config: &AppConfig) -> Option<String> {
        self.url.clone().or_else(|| config.catalog.url.clone())
    }

    /// Filter from command-line and config names combined
    pub fn filter(&self, config: &AppConfig) -> DatasetFilter {
        DatasetFilter::new(
            config.catalog.exclude.iter().chain(&self.exclude).cloned(),
            config.catalog.include.iter().chain(&self.include).cloned(),
        )
    }
}

impl LoadArgs {
    /// Default frequency from the command line, else from the config
    pub fn resolve_frequency(&self, config: &AppConfig) -> Option<String> {
        self.frequency
            .clone()
            .or_else(|| config.catalog.default_frequency.clone())
    }

    /// Run deadline from the command line, else from the config
    pub fn resolve_deadline(&self, config: &AppConfig) -> Option<Duration> {
        self.deadline.or(config.catalog.deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::{Admission, CatalogNode, SkipReason};

    fn cli(global: GlobalArgs) -> Cli {
        Cli {
            global,
            command: Commands::Config(ConfigArgs {
                action: ConfigAction::Show,
            }),
        }
    }

    #[test]
    fn test_log_level() {
        let quiet = cli(GlobalArgs {
            quiet: true,
            ..Default::default()
        });
        let verbose = cli(GlobalArgs {
            verbose: true,
            ..Default::default()
        });
        let plain = cli(GlobalArgs::default());

        assert_eq!(quiet.log_level("debug"), tracing::Level::ERROR);
        assert_eq!(verbose.log_level("error"), tracing::Level::INFO);
        assert_eq!(plain.log_level("debug"), tracing::Level::DEBUG);
        assert_eq!(plain.log_level("loud"), tracing::Level::WARN);
    }

    #[test]
    fn test_load_command_parsing() {
        let cli = Cli::try_parse_from([
            "catalog_loader",
            "load",
            "--url",
            "https://data.test/catalog.json",
            "-e",
            "ds-x",
            "--exclude",
            "ds-y",
            "-i",
            "ds-a",
            "--frequency",
            "weekly",
            "--metadata-only",
            "--deadline",
            "30m",
        ])
        .unwrap();

        let Commands::Load(args) = cli.command else {
            panic!("expected load command");
        };
        assert_eq!(args.catalog.exclude, vec!["ds-x", "ds-y"]);
        assert_eq!(args.catalog.include, vec!["ds-a"]);
        assert_eq!(args.frequency.as_deref(), Some("weekly"));
        assert!(args.metadata_only);
        assert_eq!(args.deadline, Some(Duration::from_secs(30 * 60)));
    }

    #[test]
    fn test_bad_deadline_rejected() {
        let result = Cli::try_parse_from(["catalog_loader", "load", "--deadline", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_values_override_config() {
        let mut config = AppConfig::default();
        config.catalog.url = Some("https://config.test/catalog.json".to_string());
        config.catalog.default_frequency = Some("daily".to_string());
        config.catalog.exclude = vec!["ds-b".to_string()];

        let args = LoadArgs {
            catalog: CatalogArgs {
                url: None,
                exclude: Vec::new(),
                include: vec!["ds-a".to_string(), "ds-b".to_string()],
            },
            frequency: Some("weekly".to_string()),
            ..Default::default()
        };

        assert_eq!(
            args.catalog.resolve_url(&config).as_deref(),
            Some("https://config.test/catalog.json")
        );
        assert_eq!(args.resolve_frequency(&config).as_deref(), Some("weekly"));

        let filter = args.catalog.filter(&config);
        let node = |name: &str| -> CatalogNode {
            serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
        };
        assert_eq!(filter.admit(&node("ds-a")), Admission::Reconcile);
        assert_eq!(
            filter.admit(&node("ds-b")),
            Admission::Skip(SkipReason::Excluded)
        );
    }
}
