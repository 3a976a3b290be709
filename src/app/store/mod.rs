//! Collection store collaborator
//!
//! The catalog walker only talks to the store through [`CollectionStore`].
//! Two implementations ship with the crate:
//!
//! - [`api::ApiCollectionStore`] - HTTP client for the collection store API
//! - [`memory::MemoryCollectionStore`] - in-process store that records every
//!   call, for tests and dry runs
//!
//! Upserts are keyed by foreign identifier and the store does not guarantee
//! they are safe to run concurrently for the same identifier; callers issue
//! them one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};

pub mod api;
pub mod memory;

pub use api::ApiCollectionStore;
pub use memory::{MemoryCollectionStore, StoreCall};

/// The store's handle on a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    /// Store-assigned identifier
    pub collection_id: String,
    /// Foreign identifier the collection was created with
    pub foreign_id: Option<String>,
    /// Display label
    pub label: Option<String>,
}

impl CollectionRef {
    /// Read a collection reference from a store response object
    ///
    /// The identifier is taken from `collection_id`, falling back to `id`;
    /// string and numeric values are both accepted.
    pub fn from_json(value: &Value) -> StoreResult<Self> {
        let collection_id = ["collection_id", "id"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(id_string)
            .ok_or(StoreError::MissingCollectionId)?;

        Ok(Self {
            collection_id,
            foreign_id: value
                .get("foreign_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            label: value.get("label").and_then(Value::as_str).map(str::to_string),
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Collection metadata sent on create or update
///
/// `category` and `foreign_id` are only serialized when set, and `frequency`
/// only when the outer option is set (an inner `None` is sent as null).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionPayload {
    pub label: String,
    pub summary: String,
    pub publisher: Option<String>,
    pub publisher_url: Option<String>,
    pub countries: Vec<String>,
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_id: Option<String>,
}

/// Remote collection store operations
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Look up the collection created for `foreign_id`, if any
    async fn get_collection_by_foreign_id(
        &self,
        foreign_id: &str,
    ) -> StoreResult<Option<CollectionRef>>;

    /// Create a collection
    async fn create_collection(&self, payload: &CollectionPayload) -> StoreResult<CollectionRef>;

    /// Update the metadata of an existing collection
    async fn update_collection(
        &self,
        collection_id: &str,
        payload: &CollectionPayload,
    ) -> StoreResult<CollectionRef>;

    /// Bulk-write entities into a collection, returning how many were sent
    async fn write_entities(&self, collection_id: &str, entities: &[Value]) -> StoreResult<usize>;
}

#[async_trait]
impl<S> CollectionStore for Arc<S>
where
    S: CollectionStore + ?Sized,
{
    async fn get_collection_by_foreign_id(
        &self,
        foreign_id: &str,
    ) -> StoreResult<Option<CollectionRef>> {
        (**self).get_collection_by_foreign_id(foreign_id).await
    }

    async fn create_collection(&self, payload: &CollectionPayload) -> StoreResult<CollectionRef> {
        (**self).create_collection(payload).await
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        payload: &CollectionPayload,
    ) -> StoreResult<CollectionRef> {
        (**self).update_collection(collection_id, payload).await
    }

    async fn write_entities(&self, collection_id: &str, entities: &[Value]) -> StoreResult<usize> {
        (**self).write_entities(collection_id, entities).await
    }
}
