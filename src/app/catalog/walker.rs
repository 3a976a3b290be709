//! Catalog traversal and per-dataset reconciliation
//!
//! The walker fetches the manifest eagerly (any failure there ends the run
//! before a single store call is made), then reconciles admitted datasets one
//! at a time in manifest order. Each reconciled dataset is reported before any
//! of its resource streams, and those streams do not touch the network until
//! the caller polls them.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use super::filter::{Admission, DatasetFilter};
use super::metadata::DerivedMetadata;
use super::types::{CatalogManifest, CatalogNode};
use crate::app::client::{parse_url, HttpHandler};
use crate::app::resource::{RecordStream, ResourceStreamer};
use crate::app::signals::CancelGuard;
use crate::app::store::{CollectionRef, CollectionStore};
use crate::errors::{CatalogResult, FetchError, ReconcileError, StoreError};

/// Parameters of one walk over a catalog
#[derive(Debug, Clone)]
pub struct WalkRequest {
    /// Location of the catalog manifest
    pub catalog_url: String,
    /// Name-based admission rules
    pub filter: DatasetFilter,
    /// Frequency used for nodes that do not specify one
    pub default_frequency: Option<String>,
}

impl WalkRequest {
    /// Walk every leaf dataset of the catalog at `catalog_url`
    pub fn new(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            filter: DatasetFilter::default(),
            default_frequency: None,
        }
    }

    pub fn with_filter(mut self, filter: DatasetFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_default_frequency(mut self, frequency: Option<String>) -> Self {
        self.default_frequency = frequency;
        self
    }
}

/// Whether a dataset's collection was created or updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

/// A dataset whose collection now exists in the store
#[derive(Debug, Clone)]
pub struct ReconciledDataset {
    pub foreign_id: String,
    pub collection: CollectionRef,
    pub action: UpsertAction,
    pub metadata: DerivedMetadata,
}

/// One entity resource of a reconciled dataset, ready to be consumed
#[derive(Debug)]
pub struct ResourceLoad {
    pub collection_id: String,
    pub foreign_id: String,
    pub url: String,
    pub records: RecordStream,
}

/// Items produced by [`CatalogWalker::walk`]
#[derive(Debug)]
pub enum WalkItem {
    /// A dataset's collection was created or updated
    Reconciled(ReconciledDataset),
    /// An entity resource attached to the most recently reconciled dataset
    Resource(ResourceLoad),
}

/// Dry-run verdict for one manifest node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDataset {
    pub name: String,
    pub admission: Admission,
    /// Resources that would be streamed
    pub resource_count: usize,
}

/// Fetch and parse the catalog manifest at `catalog_url`
///
/// # Errors
///
/// Returns `CatalogError` if the manifest is unreachable, answers with a
/// non-success status, or is not a valid catalog document
pub async fn fetch_manifest(
    http: &HttpHandler,
    guard: &CancelGuard,
    catalog_url: &str,
) -> CatalogResult<CatalogManifest> {
    let url = parse_url(catalog_url)?;
    info!("Fetching catalog {}", url);

    let response = guard.run(http.get_response(&url)).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
        .into());
    }

    let body = guard
        .run(async { response.bytes().await.map_err(FetchError::Http) })
        .await?;
    let manifest: CatalogManifest = serde_json::from_slice(&body)?;

    info!("Catalog lists {} top-level nodes", manifest.datasets.len());
    Ok(manifest)
}

/// Report what a walk would do, without a collection store
///
/// Only the manifest is fetched; resources are counted, never read.
///
/// # Errors
///
/// Returns `CatalogError` if the manifest cannot be fetched or parsed
pub async fn plan(
    http: &HttpHandler,
    guard: &CancelGuard,
    request: &WalkRequest,
) -> CatalogResult<Vec<PlannedDataset>> {
    let manifest = fetch_manifest(http, guard, &request.catalog_url).await?;
    Ok(plan_manifest(&manifest, &request.filter))
}

/// Admission verdict and streamable resource count for every manifest node
pub fn plan_manifest(manifest: &CatalogManifest, filter: &DatasetFilter) -> Vec<PlannedDataset> {
    manifest
        .datasets
        .iter()
        .map(|node| {
            let admission = filter.admit(node);
            PlannedDataset {
                name: node.name.clone(),
                admission,
                resource_count: match admission {
                    Admission::Reconcile => node.entity_resources().len(),
                    Admission::Skip(_) => 0,
                },
            }
        })
        .collect()
}

/// Reconciles a catalog manifest against a collection store
pub struct CatalogWalker<S> {
    http: Arc<HttpHandler>,
    store: S,
    streamer: ResourceStreamer,
    guard: CancelGuard,
}

impl<S: CollectionStore> CatalogWalker<S> {
    /// Create a walker that fetches through `http` and writes to `store`
    pub fn new(http: Arc<HttpHandler>, store: S) -> Self {
        let streamer = ResourceStreamer::new(Arc::clone(&http));
        Self {
            http,
            store,
            streamer,
            guard: CancelGuard::none(),
        }
    }

    /// Apply cancellation and a deadline to the manifest fetch, every store
    /// call and every resource read
    pub fn with_guard(mut self, guard: CancelGuard) -> Self {
        self.streamer = self.streamer.with_guard(guard.clone());
        self.guard = guard;
        self
    }

    /// The store collections are reconciled into
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch and parse the catalog manifest under this walker's guard
    ///
    /// # Errors
    ///
    /// See [`fetch_manifest`]
    pub async fn fetch_manifest(&self, catalog_url: &str) -> CatalogResult<CatalogManifest> {
        fetch_manifest(&self.http, &self.guard, catalog_url).await
    }

    /// Walk the catalog, reconciling each admitted dataset
    ///
    /// The manifest is fetched before this returns. The stream then yields,
    /// per admitted dataset in manifest order, either a
    /// [`WalkItem::Reconciled`] followed by one [`WalkItem::Resource`] per
    /// entity resource, or a single [`ReconcileError`]. A store failure for
    /// one dataset does not end the stream.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the manifest cannot be fetched or parsed
    pub async fn walk(
        &self,
        request: &WalkRequest,
    ) -> CatalogResult<impl Stream<Item = Result<WalkItem, ReconcileError>> + '_> {
        let manifest = self.fetch_manifest(&request.catalog_url).await?;

        let state = WalkState {
            nodes: manifest.datasets.into_iter(),
            pending: VecDeque::new(),
            filter: request.filter.clone(),
            default_frequency: request.default_frequency.clone(),
        };

        Ok(stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((Ok(item), state));
                }

                let node = state.nodes.next()?;
                if let Admission::Skip(reason) = state.filter.admit(&node) {
                    debug!(dataset = %node.name, "Skipping node: {}", reason);
                    continue;
                }

                let reconciled = match self
                    .reconcile(&node, state.default_frequency.as_deref())
                    .await
                {
                    Ok(reconciled) => reconciled,
                    Err(e) => return Some((Err(e), state)),
                };

                state
                    .pending
                    .extend(self.resource_loads(&node, &reconciled).map(WalkItem::Resource));
                return Some((Ok(WalkItem::Reconciled(reconciled)), state));
            }
        }))
    }

    /// Walk the catalog yielding only `(collection, record stream)` pairs
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the manifest cannot be fetched or parsed
    pub async fn walk_resources(
        &self,
        request: &WalkRequest,
    ) -> CatalogResult<impl Stream<Item = Result<ResourceLoad, ReconcileError>> + '_> {
        let items = self.walk(request).await?;
        Ok(items.filter_map(|item| async move {
            match item {
                Ok(WalkItem::Resource(load)) => Some(Ok(load)),
                Ok(WalkItem::Reconciled(_)) => None,
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// Create or update the collection for one dataset node
    ///
    /// Exactly one create or update call is made. The lookup is never cached.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if any store call fails
    pub async fn reconcile(
        &self,
        node: &CatalogNode,
        default_frequency: Option<&str>,
    ) -> Result<ReconciledDataset, ReconcileError> {
        let foreign_id = node.name.as_str();
        let wrap = |source: StoreError| ReconcileError {
            foreign_id: foreign_id.to_string(),
            source,
        };

        let existing = self
            .guard
            .run(self.store.get_collection_by_foreign_id(foreign_id))
            .await
            .map_err(wrap)?;
        let metadata = DerivedMetadata::derive(node, default_frequency);

        let (collection, action) = match existing {
            Some(existing) => {
                let payload = metadata.update_payload();
                let collection = self
                    .guard
                    .run(
                        self.store
                            .update_collection(&existing.collection_id, &payload),
                    )
                    .await
                    .map_err(wrap)?;
                info!(
                    dataset = %foreign_id,
                    event = "updated",
                    collection_id = %collection.collection_id,
                    "Updated collection {}",
                    metadata.label
                );
                (collection, UpsertAction::Updated)
            }
            None => {
                let payload = metadata.create_payload(foreign_id);
                let collection = self
                    .guard
                    .run(self.store.create_collection(&payload))
                    .await
                    .map_err(wrap)?;
                info!(
                    dataset = %foreign_id,
                    event = "created",
                    collection_id = %collection.collection_id,
                    "Created collection {}",
                    metadata.label
                );
                (collection, UpsertAction::Created)
            }
        };

        Ok(ReconciledDataset {
            foreign_id: foreign_id.to_string(),
            collection,
            action,
            metadata,
        })
    }

    fn resource_loads<'a>(
        &'a self,
        node: &'a CatalogNode,
        reconciled: &'a ReconciledDataset,
    ) -> impl Iterator<Item = ResourceLoad> + 'a {
        node.entity_resources().into_iter().filter_map(move |resource| {
            let Some(url) = resource.url.as_deref().filter(|u| !u.is_empty()) else {
                warn!(dataset = %node.name, "Entity resource has no url, skipping");
                return None;
            };
            Some(ResourceLoad {
                collection_id: reconciled.collection.collection_id.clone(),
                foreign_id: reconciled.foreign_id.clone(),
                url: url.to_string(),
                records: self.streamer.stream(url, &reconciled.foreign_id),
            })
        })
    }
}

struct WalkState {
    nodes: std::vec::IntoIter<CatalogNode>,
    pending: VecDeque<WalkItem>,
    filter: DatasetFilter,
    default_frequency: Option<String>,
}
