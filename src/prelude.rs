//! Prelude module for the catalog loader library
//!
//! Re-exports the items most integrations need, so a single
//! `use catalog_loader::prelude::*;` covers the common case.
//!
//! # Usage
//!
//! ```rust,no_run
//! use catalog_loader::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let http = Arc::new(HttpHandler::from_config(&ClientConfig::default())?);
//!     let store = Arc::new(ApiCollectionStore::new(Arc::clone(&http), "https://store.example.org/", None)?);
//!     let walker = CatalogWalker::new(http, Arc::clone(&store));
//!     let runner = LoadRunner::new(walker, EntityLoader::with_default_chunks(store));
//!
//!     let summary = runner
//!         .run(&WalkRequest::new("https://data.example.org/catalog.json"), &mut NoopObserver)
//!         .await?;
//!     summary.log();
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    ApiCollectionStore, CancelGuard, CatalogWalker, ClientConfig, CollectionStore, DatasetFilter,
    EntityLoader, HttpHandler, LoadRunner, LoadSummary, MemoryCollectionStore, NoopObserver,
    RecordStream, ResourceStreamer, RunObserver, Shutdown, WalkItem, WalkRequest,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{ENTITY_MIME_TYPE, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::sync::Arc;

pub use tokio;
