//! Catalog manifest traversal and collection reconciliation
//!
//! - [`types`] - manifest document structures
//! - [`filter`] - admission rules for dataset nodes
//! - [`metadata`] - collection metadata derived from a node
//! - [`walker`] - the walk itself: fetch, filter, reconcile, hand out streams

pub mod filter;
pub mod metadata;
pub mod types;
pub mod walker;

pub use filter::{Admission, DatasetFilter, SkipReason};
pub use metadata::DerivedMetadata;
pub use types::{CatalogManifest, CatalogNode, Publisher, ResourceDescriptor};
pub use walker::{
    fetch_manifest, plan, plan_manifest, CatalogWalker, PlannedDataset, ReconciledDataset, ResourceLoad, UpsertAction, WalkItem,
    WalkRequest,
};
