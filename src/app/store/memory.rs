//! In-memory collection store
//!
//! Records every call in order so tests can assert exactly which
//! create/update requests a run produced and what their payloads contained.
//!
//! ## Limitations
//!
//! - No persistence: all state is lost when the store is dropped
//! - Failure injection is per foreign identifier and affects create/update only

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{CollectionPayload, CollectionRef, CollectionStore};
use crate::errors::{StoreError, StoreResult};

/// One call observed by the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Lookup {
        foreign_id: String,
    },
    Create {
        payload: Value,
    },
    Update {
        collection_id: String,
        payload: Value,
    },
    WriteEntities {
        collection_id: String,
        count: usize,
    },
}

#[derive(Debug, Clone)]
struct StoredCollection {
    collection_id: String,
    foreign_id: Option<String>,
    metadata: Value,
}

impl StoredCollection {
    fn to_ref(&self) -> CollectionRef {
        CollectionRef {
            collection_id: self.collection_id.clone(),
            foreign_id: self.foreign_id.clone(),
            label: self
                .metadata
                .get("label")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: Vec<StoredCollection>,
    entities: HashMap<String, Vec<Value>>,
    calls: Vec<StoreCall>,
    failing: HashSet<String>,
    next_id: u64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    state: Mutex<MemoryState>,
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Other("memory store lock poisoned".to_string())
}

impl MemoryCollectionStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(poison_err)
    }

    /// Seed an existing collection and return its identifier
    pub fn insert_collection(&self, foreign_id: &str, metadata: Value) -> StoreResult<String> {
        let mut state = self.lock()?;
        let collection_id = state.allocate_id();
        state.collections.push(StoredCollection {
            collection_id: collection_id.clone(),
            foreign_id: Some(foreign_id.to_string()),
            metadata,
        });
        Ok(collection_id)
    }

    /// Make create/update calls for `foreign_id` fail
    pub fn fail_writes_for(&self, foreign_id: &str) -> StoreResult<()> {
        self.lock()?.failing.insert(foreign_id.to_string());
        Ok(())
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> StoreResult<Vec<StoreCall>> {
        Ok(self.lock()?.calls.clone())
    }

    /// Create and update calls only, in order
    pub fn writes(&self) -> StoreResult<Vec<StoreCall>> {
        Ok(self
            .calls()?
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Create { .. } | StoreCall::Update { .. }))
            .collect())
    }

    /// Current metadata stored for a collection
    pub fn metadata(&self, collection_id: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .lock()?
            .collections
            .iter()
            .find(|c| c.collection_id == collection_id)
            .map(|c| c.metadata.clone()))
    }

    /// Entities written to a collection so far
    pub fn entities(&self, collection_id: &str) -> StoreResult<Vec<Value>> {
        Ok(self
            .lock()?
            .entities
            .get(collection_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn get_collection_by_foreign_id(
        &self,
        foreign_id: &str,
    ) -> StoreResult<Option<CollectionRef>> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Lookup {
            foreign_id: foreign_id.to_string(),
        });
        Ok(state
            .collections
            .iter()
            .find(|c| c.foreign_id.as_deref() == Some(foreign_id))
            .map(StoredCollection::to_ref))
    }

    async fn create_collection(&self, payload: &CollectionPayload) -> StoreResult<CollectionRef> {
        let metadata = serde_json::to_value(payload)?;
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Create {
            payload: metadata.clone(),
        });

        if let Some(foreign_id) = &payload.foreign_id {
            if state.failing.contains(foreign_id) {
                return Err(StoreError::Api {
                    status: 500,
                    message: format!("injected failure for {foreign_id}"),
                });
            }
        }

        let collection = StoredCollection {
            collection_id: state.allocate_id(),
            foreign_id: payload.foreign_id.clone(),
            metadata,
        };
        let collection_ref = collection.to_ref();
        state.collections.push(collection);
        Ok(collection_ref)
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        payload: &CollectionPayload,
    ) -> StoreResult<CollectionRef> {
        let update = serde_json::to_value(payload)?;
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Update {
            collection_id: collection_id.to_string(),
            payload: update.clone(),
        });

        let failing = state.failing.clone();
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.collection_id == collection_id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("no collection {collection_id}"),
            })?;

        if collection
            .foreign_id
            .as_ref()
            .is_some_and(|fid| failing.contains(fid))
        {
            return Err(StoreError::Api {
                status: 500,
                message: format!("injected failure for collection {collection_id}"),
            });
        }

        if let (Value::Object(existing), Value::Object(changes)) = (&mut collection.metadata, update)
        {
            existing.extend(changes);
        }
        Ok(collection.to_ref())
    }

    async fn write_entities(&self, collection_id: &str, entities: &[Value]) -> StoreResult<usize> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::WriteEntities {
            collection_id: collection_id.to_string(),
            count: entities.len(),
        });
        state
            .entities
            .entry(collection_id.to_string())
            .or_default()
            .extend(entities.iter().cloned());
        Ok(entities.len())
    }
}
