//! Entity ingestion from record streams into collections
//!
//! Records are written in fixed-size chunks through
//! [`CollectionStore::write_entities`]. When a stream ends with an error the
//! records read before it are still written, then the error is returned.
//! Every bulk write runs under the loader's [`CancelGuard`], so a store that
//! stops answering cannot outlive a shutdown or the run deadline.

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::catalog::ResourceLoad;
use crate::app::signals::CancelGuard;
use crate::app::store::CollectionStore;
use crate::constants::store::DEFAULT_BULK_CHUNK_SIZE;
use crate::errors::{IngestError, IngestResult, StoreError};

/// Counters for one drained record stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records read from the stream
    pub records: usize,
    /// Bulk writes issued
    pub chunks: usize,
    /// Entities the store accepted
    pub entities_written: usize,
}

/// Drains record streams into the store
#[derive(Debug, Clone)]
pub struct EntityLoader<S> {
    store: S,
    chunk_size: usize,
    guard: CancelGuard,
}

impl<S: CollectionStore> EntityLoader<S> {
    /// Create a loader writing `chunk_size` entities per bulk call
    pub fn new(store: S, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            guard: CancelGuard::none(),
        }
    }

    /// Apply cancellation and a deadline to every bulk write
    pub fn with_guard(mut self, guard: CancelGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Create a loader with the default chunk size
    pub fn with_default_chunks(store: S) -> Self {
        Self::new(store, DEFAULT_BULK_CHUNK_SIZE)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Drain `load` into its collection
    ///
    /// # Errors
    ///
    /// Returns `IngestError` if the stream fails or a bulk write is rejected
    pub async fn load(&self, load: ResourceLoad) -> IngestResult<IngestStats> {
        self.load_with_progress(load, |_| {}).await
    }

    /// Drain `load` into its collection, reporting running totals after
    /// every bulk write
    ///
    /// # Errors
    ///
    /// Returns `IngestError` if the stream fails or a bulk write is rejected
    pub async fn load_with_progress<F>(
        &self,
        load: ResourceLoad,
        mut on_chunk: F,
    ) -> IngestResult<IngestStats>
    where
        F: FnMut(&IngestStats),
    {
        let ResourceLoad {
            collection_id,
            foreign_id,
            url,
            mut records,
        } = load;
        debug!(dataset = %foreign_id, "Loading entities from {}", url);

        let mut stats = IngestStats::default();
        let mut buffer: Vec<Value> = Vec::with_capacity(self.chunk_size);

        while let Some(record) = records.next().await {
            match record {
                Ok(entity) => {
                    stats.records += 1;
                    buffer.push(entity);
                    if buffer.len() >= self.chunk_size {
                        self.flush(&collection_id, &mut buffer, &mut stats).await?;
                        on_chunk(&stats);
                    }
                }
                Err(e) => {
                    if !buffer.is_empty() {
                        self.flush(&collection_id, &mut buffer, &mut stats).await?;
                        on_chunk(&stats);
                    }
                    warn!(
                        dataset = %foreign_id,
                        "Stream from {} stopped after {} records: {}",
                        url,
                        stats.records,
                        e
                    );
                    return Err(IngestError::Resource(e));
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(&collection_id, &mut buffer, &mut stats).await?;
            on_chunk(&stats);
        }

        info!(
            dataset = %foreign_id,
            count = stats.entities_written,
            "Wrote {} entities in {} chunks",
            stats.entities_written,
            stats.chunks
        );
        Ok(stats)
    }

    async fn flush(
        &self,
        collection_id: &str,
        buffer: &mut Vec<Value>,
        stats: &mut IngestStats,
    ) -> Result<(), StoreError> {
        let written = self
            .guard
            .run(self.store.write_entities(collection_id, buffer))
            .await?;
        stats.chunks += 1;
        stats.entities_written += written;
        buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use bytes::Bytes;
    use futures::stream::{self, StreamExt as _};

    use crate::app::resource::RecordStream;
    use crate::app::store::{CollectionPayload, CollectionRef, MemoryCollectionStore, StoreCall};
    use crate::errors::{FetchError, ResourceError, StoreResult};

    fn load_of(body: &'static str) -> ResourceLoad {
        let chunks = stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed();
        ResourceLoad {
            collection_id: "7".to_string(),
            foreign_id: "ds".to_string(),
            url: "http://resource.test/entities.json".to_string(),
            records: RecordStream::from_chunks("ds", chunks),
        }
    }

    fn bulk_sizes(store: &MemoryCollectionStore) -> Vec<usize> {
        store
            .calls()
            .unwrap()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::WriteEntities { count, .. } => Some(count),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_records() {
        let store = Arc::new(MemoryCollectionStore::new());
        let loader = EntityLoader::new(Arc::clone(&store), 2);

        let mut reported = Vec::new();
        let stats = loader
            .load_with_progress(load_of("{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n"), |s| {
                reported.push(s.entities_written)
            })
            .await
            .unwrap();

        assert_eq!(
            stats,
            IngestStats {
                records: 3,
                chunks: 2,
                entities_written: 3
            }
        );
        assert_eq!(reported, vec![2, 3]);
        assert_eq!(bulk_sizes(&store), vec![2, 1]);
        assert_eq!(store.entities("7").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_flushes_before_parse_error() {
        let store = Arc::new(MemoryCollectionStore::new());
        let loader = EntityLoader::new(Arc::clone(&store), 10);

        let err = loader
            .load(load_of("{\"id\":1}\n{\"id\":2}\nnot json\n{\"id\":4}\n"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Resource(ResourceError::Parse { line: 3, .. })
        ));
        let ids: Vec<_> = store
            .entities("7")
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_transport_interrupt_propagates() {
        let store = Arc::new(MemoryCollectionStore::new());
        let loader = EntityLoader::with_default_chunks(Arc::clone(&store));
        let chunks = stream::iter(vec![Err(ResourceError::from(FetchError::Cancelled))]).boxed();
        let load = ResourceLoad {
            collection_id: "7".to_string(),
            foreign_id: "ds".to_string(),
            url: "http://resource.test/entities.json".to_string(),
            records: RecordStream::from_chunks("ds", chunks),
        };

        let err = loader.load(load).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Resource(ResourceError::Transport(FetchError::Cancelled))
        ));
        assert!(bulk_sizes(&store).is_empty());
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let loader = EntityLoader::new(MemoryCollectionStore::new(), 0);
        assert_eq!(loader.chunk_size(), 1);
    }

    struct StalledStore;

    #[async_trait]
    impl CollectionStore for StalledStore {
        async fn get_collection_by_foreign_id(
            &self,
            _foreign_id: &str,
        ) -> StoreResult<Option<CollectionRef>> {
            Ok(None)
        }

        async fn create_collection(
            &self,
            _payload: &CollectionPayload,
        ) -> StoreResult<CollectionRef> {
            Err(StoreError::MissingCollectionId)
        }

        async fn update_collection(
            &self,
            _collection_id: &str,
            _payload: &CollectionPayload,
        ) -> StoreResult<CollectionRef> {
            Err(StoreError::MissingCollectionId)
        }

        async fn write_entities(
            &self,
            _collection_id: &str,
            _entities: &[Value],
        ) -> StoreResult<usize> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_bulk_write_gives_up_at_deadline() {
        let loader = EntityLoader::new(StalledStore, 1).with_guard(
            CancelGuard::none().with_timeout(Duration::from_millis(100)),
        );

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            loader.load(load_of("{\"id\":1}\n")),
        )
        .await
        .expect("bulk write should be abandoned at the deadline")
        .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Store(StoreError::Transport(FetchError::DeadlineExceeded))
        ));
    }
}
