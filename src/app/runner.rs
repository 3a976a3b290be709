//! Drives a full load: walk the catalog, then drain each resource stream
//!
//! A failing dataset or stream is recorded in the [`LoadSummary`] and the run
//! moves on. Only a manifest failure ends the run with an error; cancellation
//! or an expired deadline stops it early with the summary marked interrupted.

use futures::{pin_mut, StreamExt};
use tracing::{info, warn};

use crate::app::catalog::{CatalogWalker, ReconciledDataset, ResourceLoad, WalkItem, WalkRequest};
use crate::app::ingest::{EntityLoader, IngestStats};
use crate::app::store::CollectionStore;
use crate::app::summary::LoadSummary;
use crate::errors::{CatalogResult, IngestError, ReconcileError, ResourceError, StoreError};

/// Hooks for reporting run progress
///
/// Every method has a no-op default.
pub trait RunObserver {
    fn dataset_reconciled(&mut self, _dataset: &ReconciledDataset) {}
    fn dataset_failed(&mut self, _error: &ReconcileError) {}
    fn resource_started(&mut self, _load: &ResourceLoad) {}
    fn entities_written(&mut self, _foreign_id: &str, _stats: &IngestStats) {}
    fn resource_finished(&mut self, _foreign_id: &str, _result: Result<&IngestStats, &IngestError>) {}
}

/// Observer that reports nothing
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Reconciles a catalog and optionally ingests its entities
pub struct LoadRunner<S> {
    walker: CatalogWalker<S>,
    loader: Option<EntityLoader<S>>,
}

impl<S: CollectionStore> LoadRunner<S> {
    /// Reconcile collections and ingest every entity resource
    pub fn new(walker: CatalogWalker<S>, loader: EntityLoader<S>) -> Self {
        Self {
            walker,
            loader: Some(loader),
        }
    }

    /// Reconcile collections only; resource streams are never opened
    pub fn metadata_only(walker: CatalogWalker<S>) -> Self {
        Self {
            walker,
            loader: None,
        }
    }

    pub fn walker(&self) -> &CatalogWalker<S> {
        &self.walker
    }

    /// Run the load
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the manifest cannot be fetched or parsed
    pub async fn run<O>(&self, request: &WalkRequest, observer: &mut O) -> CatalogResult<LoadSummary>
    where
        O: RunObserver + ?Sized,
    {
        let mut summary = LoadSummary::new();
        let items = self.walker.walk(request).await?;
        pin_mut!(items);

        while let Some(item) = items.next().await {
            match item {
                Ok(WalkItem::Reconciled(dataset)) => {
                    summary.record_reconciled(dataset.action);
                    observer.dataset_reconciled(&dataset);
                }
                Ok(WalkItem::Resource(load)) => match &self.loader {
                    Some(loader) => {
                        if !self.ingest(loader, load, &mut summary, observer).await {
                            summary.mark_interrupted();
                            break;
                        }
                    }
                    None => summary.record_resource_skipped(),
                },
                Err(e) if reconcile_interrupted(&e) => {
                    warn!("{}", e);
                    summary.mark_interrupted();
                    break;
                }
                Err(e) => {
                    warn!(dataset = %e.foreign_id, "{}", e);
                    observer.dataset_failed(&e);
                    summary.record_dataset_failure(e.to_string());
                }
            }
        }

        summary.finish();
        info!(
            "Load finished: {} datasets reconciled, {} failed",
            summary.datasets_reconciled(),
            summary.datasets_failed
        );
        Ok(summary)
    }

    /// Drain one stream; returns `false` if the run was interrupted
    async fn ingest<O>(
        &self,
        loader: &EntityLoader<S>,
        load: ResourceLoad,
        summary: &mut LoadSummary,
        observer: &mut O,
    ) -> bool
    where
        O: RunObserver + ?Sized,
    {
        observer.resource_started(&load);
        let foreign_id = load.foreign_id.clone();
        let url = load.url.clone();

        let mut last = IngestStats::default();
        let result = loader
            .load_with_progress(load, |stats| {
                last = *stats;
                observer.entities_written(&foreign_id, stats);
            })
            .await;

        match result {
            Ok(stats) => {
                observer.resource_finished(&foreign_id, Ok(&stats));
                summary.record_resource(&stats);
                true
            }
            Err(e) => {
                observer.resource_finished(&foreign_id, Err(&e));
                summary.record_resource_failure(&last, format!("{foreign_id} ({url}): {e}"));
                !ingest_interrupted(&e)
            }
        }
    }
}

fn reconcile_interrupted(error: &ReconcileError) -> bool {
    matches!(&error.source, StoreError::Transport(e) if e.is_interrupt())
}

fn ingest_interrupted(error: &IngestError) -> bool {
    match error {
        IngestError::Resource(ResourceError::Transport(e))
        | IngestError::Store(StoreError::Transport(e)) => e.is_interrupt(),
        _ => false,
    }
}
