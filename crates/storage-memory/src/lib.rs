//! In-memory log storage implementation

use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use topicmesh_storage::{Storage, StorageAdaptor, StorageError, StorageResult};
use tracing::debug;

/// In-memory append-only log, lives as long as the process
#[derive(Clone)]
pub struct MemoryStorage {
    records: Arc<RwLock<Vec<Bytes>>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory log
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn append(&self, record: Bytes) -> StorageResult<u64> {
        let mut records = self.records.write().await;
        let index = records.len() as u64;
        records.push(record);
        Ok(index)
    }

    async fn len(&self) -> StorageResult<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn get(&self, index: u64) -> StorageResult<Bytes> {
        let records = self.records.read().await;
        usize::try_from(index)
            .ok()
            .and_then(|i| records.get(i).cloned())
            .ok_or(StorageError::OutOfRange {
                index,
                length: records.len() as u64,
            })
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("records", &"<locked>")
            .finish()
    }
}

/// Hands out one [`MemoryStorage`] per topic name
#[derive(Clone, Debug, Default)]
pub struct MemoryAdaptor {
    logs: Arc<RwLock<HashMap<String, MemoryStorage>>>,
}

impl MemoryAdaptor {
    /// Create an adaptor with no logs
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdaptor for MemoryAdaptor {
    type Storage = MemoryStorage;

    async fn open(&self, topic: &str) -> StorageResult<MemoryStorage> {
        let mut logs = self.logs.write().await;
        let storage = logs.entry(topic.to_string()).or_insert_with(|| {
            debug!("creating in-memory log for topic {}", topic);
            MemoryStorage::new()
        });
        Ok(storage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_returns_previous_length() {
        let _ = tracing_subscriber::fmt::try_init();

        let storage = MemoryStorage::new();

        assert_eq!(storage.append(Bytes::from("a")).await.unwrap(), 0);
        assert_eq!(storage.append(Bytes::from("b")).await.unwrap(), 1);
        assert_eq!(storage.append(Bytes::from("c")).await.unwrap(), 2);
        assert_eq!(storage.len().await.unwrap(), 3);

        assert_eq!(storage.get(0).await.unwrap(), Bytes::from("a"));
        assert_eq!(storage.get(2).await.unwrap(), Bytes::from("c"));
    }

    #[tokio::test]
    async fn test_get_out_of_range() {
        let _ = tracing_subscriber::fmt::try_init();

        let storage = MemoryStorage::new();
        assert!(storage.is_empty().await.unwrap());

        storage.append(Bytes::from("only")).await.unwrap();

        match storage.get(1).await {
            Err(StorageError::OutOfRange { index, length }) => {
                assert_eq!(index, 1);
                assert_eq!(length, 1);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let _ = tracing_subscriber::fmt::try_init();

        let storage = MemoryStorage::new();
        let reader = storage.clone();

        storage.append(Bytes::from("shared")).await.unwrap();

        assert_eq!(reader.len().await.unwrap(), 1);
        assert_eq!(reader.get(0).await.unwrap(), Bytes::from("shared"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_indices() {
        let _ = tracing_subscriber::fmt::try_init();

        let storage = MemoryStorage::new();

        let mut handles = Vec::new();
        for i in 0..20 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.append(Bytes::from(format!("r{i}"))).await.unwrap()
            }));
        }

        let mut indices = Vec::new();
        for handle in handles {
            indices.push(handle.await.unwrap());
        }
        indices.sort_unstable();

        assert_eq!(indices, (0..20).collect::<Vec<u64>>());
        assert_eq!(storage.len().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_adaptor_reopens_same_log() {
        let _ = tracing_subscriber::fmt::try_init();

        let adaptor = MemoryAdaptor::new();

        let first = adaptor.open("orders").await.unwrap();
        first.append(Bytes::from("o-1")).await.unwrap();

        let again = adaptor.open("orders").await.unwrap();
        assert_eq!(again.len().await.unwrap(), 1);

        let other = adaptor.open("payments").await.unwrap();
        assert!(other.is_empty().await.unwrap());
    }
}
