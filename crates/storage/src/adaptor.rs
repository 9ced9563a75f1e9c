//! Storage adaptor trait for provisioning per-topic logs
//!
//! A node does not know which backend it runs on. It asks the adaptor for the
//! log of a topic by name and receives a [`Storage`] handle.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Storage, StorageResult};

/// Abstract interface for storage backends
#[async_trait]
pub trait StorageAdaptor: Debug + Send + Sync + Clone + 'static {
    /// The log type handed out for each topic
    type Storage: Storage;

    /// Open (or create) the log backing `topic`
    ///
    /// Opening the same topic twice must return handles to the same log.
    async fn open(&self, topic: &str) -> StorageResult<Self::Storage>;

    /// Gracefully shutdown the storage, ensuring all data is persisted
    async fn shutdown(&self) -> StorageResult<()> {
        Ok(())
    }
}
