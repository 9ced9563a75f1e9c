use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::ServiceRecord;

/// A local-network service registry.
///
/// Clones share one registry connection.
#[async_trait]
pub trait ServiceRegistry: Clone + Debug + Send + Sync + 'static {
    /// Backend error type.
    type Error: StdError + Send + Sync + 'static;

    /// Open the registry connection.
    async fn start(&self) -> Result<(), Self::Error>;

    /// Announce a service instance, replacing one with the same label.
    async fn register(&self, record: ServiceRecord) -> Result<(), Self::Error>;

    /// Withdraw the instance with label `instance`.
    async fn unregister(&self, instance: &str) -> Result<(), Self::Error>;

    /// Every service instance currently known, topic endpoints or not.
    async fn discover(&self) -> Result<Vec<ServiceRecord>, Self::Error>;

    /// Close the registry connection.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}
