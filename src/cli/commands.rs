//! Command handlers for the catalog loader CLI
//!
//! This module implements the command handlers that turn parsed arguments
//! and the loaded configuration into a run of the core components.

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::catalog::{self, Admission, CatalogWalker, WalkRequest};
use crate::app::ingest::EntityLoader;
use crate::app::runner::LoadRunner;
use crate::app::signals::{CancelGuard, Shutdown};
use crate::app::store::ApiCollectionStore;
use crate::app::summary::LoadSummary;
use crate::app::HttpHandler;
use crate::cli::progress::{spinner, LoadProgress};
use crate::cli::{CatalogArgs, ConfigAction, ConfigArgs, LoadArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, ConfigError, Result, StoreError};

/// Handle the load command
///
/// Reconciles every admitted dataset and, unless `--metadata-only` is given,
/// streams its entity resources into the store.
pub async fn handle_load(args: LoadArgs, config: &AppConfig, show_progress: bool) -> Result<LoadSummary> {
    let request = walk_request(&args.catalog, config)?
        .with_default_frequency(args.resolve_frequency(config));

    let host = config
        .store
        .host
        .as_deref()
        .ok_or(StoreError::MissingCredentials)?;
    if config.store.api_key.is_none() {
        warn!("No collection store API key configured; requests will be anonymous");
    }

    let http = Arc::new(HttpHandler::from_config(&config.client.to_runtime_config())?);
    let store = Arc::new(ApiCollectionStore::new(
        Arc::clone(&http),
        host,
        config.store.api_key.clone(),
    )?);

    let shutdown = Shutdown::new();
    let signal_task = shutdown.install_signal_handler();
    let mut guard = CancelGuard::none().with_listener(shutdown.listener());
    if let Some(deadline) = args.resolve_deadline(config) {
        info!("Run deadline set to {:?}", deadline);
        guard = guard.with_timeout(deadline);
    }

    let walker = CatalogWalker::new(http, Arc::clone(&store)).with_guard(guard.clone());
    let runner = if args.metadata_only {
        info!("Metadata-only run; entity resources will not be read");
        LoadRunner::metadata_only(walker)
    } else {
        LoadRunner::new(
            walker,
            EntityLoader::new(store, config.store.bulk_chunk_size).with_guard(guard),
        )
    };

    let mut progress = LoadProgress::new(show_progress);
    let result = runner.run(&request, &mut progress).await;
    progress.finish();
    signal_task.abort();

    let summary = result?;
    summary.log();
    print_summary(&summary);
    Ok(summary)
}

/// Handle the plan command
///
/// Fetches the manifest and prints, per node, whether a load would reconcile
/// it. The collection store is never contacted.
pub async fn handle_plan(args: CatalogArgs, config: &AppConfig, show_progress: bool) -> Result<()> {
    let request = walk_request(&args, config)?;
    let http = HttpHandler::from_config(&config.client.to_runtime_config())?;

    let bar = spinner("Fetching catalog...", show_progress);
    let plan = catalog::plan(&http, &CancelGuard::none(), &request).await;
    bar.finish_and_clear();
    let plan = plan?;

    let mut admitted = 0;
    let mut resources = 0;
    for dataset in &plan {
        match dataset.admission {
            Admission::Reconcile => {
                admitted += 1;
                resources += dataset.resource_count;
                println!(
                    "  + {:<40} {} entity resource(s)",
                    dataset.name, dataset.resource_count
                );
            }
            Admission::Skip(reason) => println!("  - {:<40} {}", dataset.name, reason),
        }
    }
    println!();
    println!(
        "{} of {} nodes would be reconciled, {} resource(s) streamed",
        admitted,
        plan.len(),
        resources
    );
    Ok(())
}

/// Handle configuration management commands
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let written = AppConfig::write_default(path, force).await?;
            println!("Created configuration file:");
            println!("   {}", written.display());
        }
        ConfigAction::Show => {
            print!("{}", config.to_display_toml()?);
        }
    }
    Ok(())
}

fn walk_request(args: &CatalogArgs, config: &AppConfig) -> Result<WalkRequest> {
    let url = args.resolve_url(config).ok_or_else(|| {
        AppError::from(ConfigError::MissingField {
            field: "catalog url (--url or catalog.url)".to_string(),
        })
    })?;
    Ok(WalkRequest::new(url).with_filter(args.filter(config)))
}

fn print_summary(summary: &LoadSummary) {
    println!();
    println!(
        "Datasets: {} created, {} updated, {} failed",
        summary.datasets_created, summary.datasets_updated, summary.datasets_failed
    );
    println!(
        "Resources: {} streamed, {} failed, {} not read",
        summary.resources_streamed, summary.resources_failed, summary.resources_skipped
    );
    println!("Entities written: {}", summary.entities_written);
    println!("Elapsed: {:.1}s", summary.duration().as_secs_f64());
    if summary.interrupted {
        println!("Run interrupted before the catalog was fully processed");
    }
}
