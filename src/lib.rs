//! Catalog Loader Library
//!
//! Reconciles a remote JSON dataset catalog against a collection store: one
//! collection is created or updated per dataset, and each dataset's
//! structured-entity resources are streamed line by line for bulk ingestion.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
