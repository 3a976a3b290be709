//! Core application logic for the catalog loader
//!
//! This module contains the HTTP transport, the collection store client, the
//! catalog walker and resource streamer, and the orchestration that ties them
//! into a load run.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use catalog_loader::app::{CatalogWalker, ClientConfig, HttpHandler, MemoryCollectionStore, WalkItem, WalkRequest};
//! use futures::{pin_mut, StreamExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(HttpHandler::from_config(&ClientConfig::default())?);
//! let walker = CatalogWalker::new(http, MemoryCollectionStore::new());
//!
//! let items = walker.walk(&WalkRequest::new("https://data.example.org/catalog.json")).await?;
//! pin_mut!(items);
//! while let Some(item) = items.next().await {
//!     match item {
//!         Ok(WalkItem::Reconciled(dataset)) => println!("{} -> {}", dataset.foreign_id, dataset.collection.collection_id),
//!         Ok(WalkItem::Resource(mut load)) => {
//!             while let Some(record) = load.records.next().await {
//!                 println!("{}", record?);
//!             }
//!         }
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod ingest;
pub mod resource;
pub mod runner;
pub mod signals;
pub mod store;
pub mod summary;

// Re-export main public API
pub use catalog::{
    Admission, CatalogWalker, DatasetFilter, DerivedMetadata, PlannedDataset, ReconciledDataset,
    ResourceLoad, SkipReason, UpsertAction, WalkItem, WalkRequest,
};
pub use client::{ClientConfig, HttpHandler};
pub use ingest::{EntityLoader, IngestStats};
pub use resource::{RecordStream, ResourceStreamer};
pub use runner::{LoadRunner, NoopObserver, RunObserver};
pub use signals::{CancelGuard, Shutdown, ShutdownListener};
pub use store::{
    ApiCollectionStore, CollectionPayload, CollectionRef, CollectionStore, MemoryCollectionStore,
};
pub use summary::LoadSummary;
