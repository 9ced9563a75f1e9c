//! Client handles for topics hosted elsewhere
//!
//! A deployment names the topics it reads and writes. The connector looks
//! each one up through a [`Witness`] and dials the matching endpoint:
//! producers push into the topic's redeable server, consumers pull from its
//! writeable server.

use std::collections::HashMap;
use std::sync::Arc;

use topicmesh_discovery::{Error as DiscoveryError, Role, ServiceRegistry, Witness};
use topicmesh_storage::{Storage, StorageAdaptor};
use topicmesh_topic::{RedeableClient, TopicConfig, TopicQueue, WriteableClient};
use tracing::{debug, info};

use crate::Error;

/// One topic a deployment wants, under a local alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicBinding {
    /// Name the worker refers to the handle by.
    pub alias: String,
    /// Whether the worker writes to or reads from the topic.
    pub role: Role,
    /// The topic's name.
    pub topic: String,
}

impl TopicBinding {
    /// Bind `topic` as `alias` in `role`.
    pub fn new(alias: impl Into<String>, role: Role, topic: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            role,
            topic: topic.into(),
        }
    }
}

/// A connected client for one binding.
#[derive(Debug)]
pub enum TopicHandle<S: Storage> {
    /// Records put here reach the remote topic.
    Producer(Arc<WriteableClient<S>>),
    /// Records of the remote topic arrive here.
    Consumer(Arc<RedeableClient<S>>),
}

impl<S: Storage> TopicHandle<S> {
    async fn stop(&self) {
        match self {
            Self::Producer(client) => client.stop().await,
            Self::Consumer(client) => client.stop().await,
        }
    }
}

/// Connected handles by alias.
#[derive(Debug)]
pub struct TopicHandles<S: Storage> {
    handles: HashMap<String, TopicHandle<S>>,
}

impl<S: Storage> TopicHandles<S> {
    /// The handle bound as `alias`.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&TopicHandle<S>> {
        self.handles.get(alias)
    }

    /// The producer bound as `alias`.
    ///
    /// # Errors
    ///
    /// Fails if no producer is bound under that alias.
    pub fn producer(&self, alias: &str) -> Result<&Arc<WriteableClient<S>>, Error> {
        match self.handles.get(alias) {
            Some(TopicHandle::Producer(client)) => Ok(client),
            _ => Err(Error::RoleMismatch {
                alias: alias.to_string(),
                expected: Role::Producer.as_str(),
            }),
        }
    }

    /// The consumer bound as `alias`.
    ///
    /// # Errors
    ///
    /// Fails if no consumer is bound under that alias.
    pub fn consumer(&self, alias: &str) -> Result<&Arc<RedeableClient<S>>, Error> {
        match self.handles.get(alias) {
            Some(TopicHandle::Consumer(client)) => Ok(client),
            _ => Err(Error::RoleMismatch {
                alias: alias.to_string(),
                expected: Role::Consumer.as_str(),
            }),
        }
    }

    /// Bound aliases, sorted.
    #[must_use]
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.handles.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Number of handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether there are no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Disconnect every handle.
    pub async fn stop(&self) {
        for handle in self.handles.values() {
            handle.stop().await;
        }
    }
}

/// Builds [`TopicHandles`] from discovered topics.
///
/// Each handle gets a local log from the adaptor, named after its alias and
/// topic, that buffers records on this side of the connection.
#[derive(Debug)]
pub struct TopicConnector<A: StorageAdaptor> {
    adaptor: A,
    config: TopicConfig,
}

impl<A: StorageAdaptor> TopicConnector<A> {
    /// Create a connector buffering through `adaptor`.
    pub const fn new(adaptor: A, config: TopicConfig) -> Self {
        Self { adaptor, config }
    }

    /// Resolve and dial every binding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteTopics`] naming every topic that is not
    /// discoverable; nothing is dialed in that case. Fails if a connection
    /// cannot be made, after closing the ones already open.
    pub async fn connect<G: ServiceRegistry>(
        &self,
        witness: &Witness<G>,
        bindings: &[TopicBinding],
    ) -> Result<TopicHandles<A::Storage>, Error> {
        let mut resolved = Vec::with_capacity(bindings.len());
        let mut missing = Vec::new();

        for binding in bindings {
            match witness.lookup_role(&binding.topic, binding.role).await {
                Ok(address) => resolved.push((binding, address)),
                Err(DiscoveryError::NotTopicAvailable(_)) => missing.push(binding.topic.clone()),
                Err(e) => return Err(e.into()),
            }
        }

        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(Error::IncompleteTopics(missing));
        }

        let mut handles = TopicHandles {
            handles: HashMap::new(),
        };
        for (binding, address) in resolved {
            match self.dial(binding, address).await {
                Ok(handle) => {
                    handles.handles.insert(binding.alias.clone(), handle);
                }
                Err(e) => {
                    handles.stop().await;
                    return Err(e);
                }
            }
        }

        info!(handles = handles.len(), "topic handles connected");
        Ok(handles)
    }

    async fn dial(
        &self,
        binding: &TopicBinding,
        address: topicmesh_topic::TopicAddress,
    ) -> Result<TopicHandle<A::Storage>, Error> {
        let log = format!("{}@{}", binding.alias, binding.topic);
        let queue = TopicQueue::shared(self.adaptor.open(&log).await?);
        debug!(alias = %binding.alias, role = %binding.role, "dialing {address}");

        let handle = match binding.role {
            Role::Producer => {
                let client =
                    WriteableClient::writeable(&binding.topic, queue, address, self.config).await?;
                client.start().await?;
                TopicHandle::Producer(Arc::new(client))
            }
            Role::Consumer => {
                let client =
                    RedeableClient::redeable(&binding.topic, queue, address, self.config).await?;
                client.start().await?;
                TopicHandle::Consumer(Arc::new(client))
            }
        };
        Ok(handle)
    }
}
