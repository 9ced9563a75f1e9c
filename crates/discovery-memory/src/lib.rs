//! In-process service registry
//!
//! Every clone of a [`MemoryRegistry`] sees the same records, which makes it
//! a drop-in stand-in for multicast DNS when all topic nodes share one
//! process.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use topicmesh_discovery::{ServiceRecord, ServiceRegistry};
use tracing::trace;

/// Registry held in shared memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    services: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Whether no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

#[async_trait]
impl ServiceRegistry for MemoryRegistry {
    type Error = Infallible;

    async fn start(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn register(&self, record: ServiceRecord) -> Result<(), Self::Error> {
        trace!(instance = %record.instance, "registering service");
        self.services.write().insert(record.instance.clone(), record);
        Ok(())
    }

    async fn unregister(&self, instance: &str) -> Result<(), Self::Error> {
        trace!(instance, "unregistering service");
        self.services.write().remove(instance);
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<ServiceRecord>, Self::Error> {
        Ok(self.services.read().values().cloned().collect())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_records() {
        let registry = MemoryRegistry::new();
        let other = registry.clone();

        registry
            .register(ServiceRecord {
                instance: "a".to_string(),
                addresses: vec!["127.0.0.1:1".parse().unwrap()],
                properties: HashMap::new(),
            })
            .await
            .unwrap();

        assert_eq!(other.discover().await.unwrap().len(), 1);
        other.unregister("a").await.unwrap();
        assert!(registry.is_empty());
    }
}
