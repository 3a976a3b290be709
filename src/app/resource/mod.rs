//! Structured-entity resource streaming
//!
//! Turns a resource URL into a lazy [`RecordStream`] of JSON values, one per
//! line of the response body.

pub mod streaming;

pub use streaming::{ChunkStream, RecordStream, ResourceStreamer};
