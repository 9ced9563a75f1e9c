//! The four concrete endpoint kinds
//!
//! Each is a connection kind holding one stream role. Writeable endpoints
//! accept records with `put`, redeable endpoints hand them out with `get`.

use std::sync::Arc;

use topicmesh_storage::Storage;

use crate::client::TopicClient;
use crate::queue::TopicQueue;
use crate::role::{Redeable, Writeable};
use crate::server::TopicServer;
use crate::{Error, TopicAddress, TopicConfig};

/// Serves queued records to any number of pulling peers.
pub type WriteableServer<S> = TopicServer<Writeable<S>>;

/// Pushes queued records to one remote redeable.
pub type WriteableClient<S> = TopicClient<Writeable<S>>;

/// Accepts records from any number of pushing peers.
pub type RedeableServer<S> = TopicServer<Redeable<S>>;

/// Pulls records from one remote writeable.
pub type RedeableClient<S> = TopicClient<Redeable<S>>;

impl<S: Storage> TopicServer<Writeable<S>> {
    /// Build a writeable server for `topic` over `queue`.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn writeable(
        topic: impl Into<String>,
        queue: Arc<TopicQueue<S>>,
        address: TopicAddress,
        config: TopicConfig,
    ) -> Result<Self, Error> {
        let role = Writeable::new(topic, queue, &config).await?;
        Ok(Self::new(role, address, config))
    }

    /// Queue a record for the next peer that asks.
    ///
    /// # Errors
    ///
    /// Fails if the log rejects the append.
    pub async fn put(&self, record: impl Into<String> + Send) -> Result<u64, Error> {
        self.role.put(record).await
    }

    /// Wait until at least `count` peers are ready.
    pub async fn wait_for_peers(&self, count: usize) {
        self.role.wait_for_peers(count).await;
    }
}

impl<S: Storage> TopicClient<Writeable<S>> {
    /// Build a writeable client for `topic` dialing `address`.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn writeable(
        topic: impl Into<String>,
        queue: Arc<TopicQueue<S>>,
        address: TopicAddress,
        config: TopicConfig,
    ) -> Result<Self, Error> {
        let role = Writeable::new(topic, queue, &config).await?;
        Ok(Self::new(role, address, config))
    }

    /// Queue a record, sent once the remote redeable asks for it.
    ///
    /// # Errors
    ///
    /// Fails if the log rejects the append.
    pub async fn put(&self, record: impl Into<String> + Send) -> Result<u64, Error> {
        self.role.put(record).await
    }

    /// Wait until the remote redeable has asked for a record.
    pub async fn wait_for_peers(&self, count: usize) {
        self.role.wait_for_peers(count).await;
    }
}

impl<S: Storage> TopicServer<Redeable<S>> {
    /// Build a redeable server for `topic` over `queue`.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn redeable(
        topic: impl Into<String>,
        queue: Arc<TopicQueue<S>>,
        address: TopicAddress,
        config: TopicConfig,
    ) -> Result<Self, Error> {
        let role = Redeable::new(topic, queue).await?;
        Ok(Self::new(role, address, config))
    }

    /// Next record received from any peer.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be read or the record is not UTF-8.
    pub async fn get(&self) -> Result<String, Error> {
        self.role.get(None).await
    }

    /// Next record received from any peer, reading as `group`.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be read or the record is not UTF-8.
    pub async fn get_from(&self, group: &str) -> Result<String, Error> {
        self.role.get(Some(group)).await
    }
}

impl<S: Storage> TopicClient<Redeable<S>> {
    /// Build a redeable client for `topic` dialing `address`.
    ///
    /// # Errors
    ///
    /// Fails if the queue cannot read its log.
    pub async fn redeable(
        topic: impl Into<String>,
        queue: Arc<TopicQueue<S>>,
        address: TopicAddress,
        config: TopicConfig,
    ) -> Result<Self, Error> {
        let role = Redeable::new(topic, queue).await?;
        Ok(Self::new(role, address, config))
    }

    /// Next record pulled from the remote writeable.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be read or the record is not UTF-8.
    pub async fn get(&self) -> Result<String, Error> {
        self.role.get(None).await
    }
}
