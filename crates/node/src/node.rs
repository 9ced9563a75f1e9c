//! Topics hosted by one process
//!
//! Every topic is a pair of servers over one log: a redeable server that
//! producers push into and a writeable server that consumers pull from.
//! Each server reads through its own fork of the queue, so the local reader
//! of the redeable side never takes records from remote consumers.
//! Both are announced through the node's moderator, tagged `producer` and
//! `consumer` after the side that dials them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use topicmesh_bootable::Bootable;
use topicmesh_discovery::{Moderator, Role, ServiceRegistry};
use topicmesh_storage::StorageAdaptor;
use topicmesh_topic::{
    DEFAULT_SCHEME, RedeableServer, TopicAddress, TopicQueue, WriteableServer,
};
use tracing::{info, warn};

use crate::{Error, Interface, NodeConfig};

struct TopicEntry<A: StorageAdaptor> {
    readable: Arc<RedeableServer<A::Storage>>,
    writeable: Arc<WriteableServer<A::Storage>>,
    references: usize,
}

/// Hosts topics for one process and announces them.
pub struct TopicNode<A: StorageAdaptor, G: ServiceRegistry> {
    adaptor: A,
    moderator: Moderator<G>,
    config: NodeConfig,
    topics: Mutex<HashMap<String, TopicEntry<A>>>,
    stopped: CancellationToken,
}

impl<A: StorageAdaptor, G: ServiceRegistry> TopicNode<A, G> {
    /// Create a node storing topics through `adaptor` and announcing them
    /// on `registry`.
    pub fn new(adaptor: A, registry: G, config: NodeConfig) -> Self {
        Self {
            adaptor,
            moderator: Moderator::new(registry),
            config,
            topics: Mutex::new(HashMap::new()),
            stopped: CancellationToken::new(),
        }
    }

    /// The moderator announcing this node's topics.
    pub const fn moderator(&self) -> &Moderator<G> {
        &self.moderator
    }

    /// Host `name`, or take another reference if it is already hosted.
    ///
    /// A new topic gets both servers bound on `interface` (the configured
    /// default if `None`) and announced. Returns `false` if the topic was
    /// already hosted.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be opened, a server cannot bind, or the
    /// announcement is refused.
    pub async fn add_topic(&self, name: &str, interface: Option<Interface>) -> Result<bool, Error> {
        let mut topics = self.topics.lock().await;
        if let Some(entry) = topics.get_mut(name) {
            entry.references += 1;
            info!(topic = name, references = entry.references, "topic shared");
            return Ok(false);
        }

        let ip = interface.unwrap_or_else(|| self.config.interface.clone()).resolve()?;
        let address = TopicAddress::unbound(DEFAULT_SCHEME, ip)?;
        let queue = TopicQueue::shared(self.adaptor.open(name).await?);
        let outgoing = Arc::new(queue.fork());

        let readable = Arc::new(
            RedeableServer::redeable(name, queue, address.clone(), self.config.topic).await?,
        );
        let writeable = Arc::new(
            WriteableServer::writeable(name, outgoing, address, self.config.topic).await?,
        );
        let entry = TopicEntry {
            readable,
            writeable,
            references: 1,
        };

        self.bring_up(name, &entry).await?;
        topics.insert(name.to_string(), entry);

        info!(topic = name, "topic added");
        Ok(true)
    }

    /// Drop one reference to `name`, tearing it down at zero.
    ///
    /// Returns `true` if the topic was torn down and `false` if references
    /// remain. Deleting a topic that is not hosted is an error, not a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopic`] if `name` is not hosted, or an error if
    /// the announcement cannot be withdrawn.
    pub async fn del_topic(&self, name: &str) -> Result<bool, Error> {
        let mut topics = self.topics.lock().await;
        let entry = topics
            .get_mut(name)
            .ok_or_else(|| Error::NotTopic(name.to_string()))?;

        entry.references -= 1;
        if entry.references > 0 {
            info!(topic = name, references = entry.references, "topic released");
            return Ok(false);
        }

        if let Some(entry) = topics.remove(name) {
            self.bring_down(name, &entry).await?;
        }

        info!(topic = name, "topic deleted");
        Ok(true)
    }

    /// The server producers push `name`'s records into.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopic`] if `name` is not hosted.
    pub async fn get_readable(&self, name: &str) -> Result<Arc<RedeableServer<A::Storage>>, Error> {
        self.topics
            .lock()
            .await
            .get(name)
            .map(|entry| entry.readable.clone())
            .ok_or_else(|| Error::NotTopic(name.to_string()))
    }

    /// The server consumers pull `name`'s records from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopic`] if `name` is not hosted.
    pub async fn get_writeable(
        &self,
        name: &str,
    ) -> Result<Arc<WriteableServer<A::Storage>>, Error> {
        self.topics
            .lock()
            .await
            .get(name)
            .map(|entry| entry.writeable.clone())
            .ok_or_else(|| Error::NotTopic(name.to_string()))
    }

    /// References held on `name`, `None` if it is not hosted.
    pub async fn references(&self, name: &str) -> Option<usize> {
        self.topics.lock().await.get(name).map(|entry| entry.references)
    }

    /// Names of hosted topics, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Bind and announce the servers of `name`, or of every topic.
    ///
    /// Servers already running are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopic`] for an unknown name, or an error if a
    /// server cannot bind or be announced. A topic that fails is left
    /// stopped and unannounced.
    pub async fn start_topics(&self, name: Option<&str>) -> Result<(), Error> {
        let topics = self.topics.lock().await;
        for (topic, entry) in Self::select(&topics, name)? {
            self.bring_up(topic, entry).await?;
        }
        Ok(())
    }

    /// Withdraw and unbind the servers of `name`, or of every topic.
    ///
    /// The topics stay hosted and keep their records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopic`] for an unknown name, or an error if the
    /// announcement cannot be withdrawn.
    pub async fn stop_topics(&self, name: Option<&str>) -> Result<(), Error> {
        let topics = self.topics.lock().await;
        for (topic, entry) in Self::select(&topics, name)? {
            self.bring_down(topic, entry).await?;
        }
        Ok(())
    }

    fn select<'a>(
        topics: &'a HashMap<String, TopicEntry<A>>,
        name: Option<&str>,
    ) -> Result<Vec<(&'a str, &'a TopicEntry<A>)>, Error> {
        match name {
            Some(name) => topics
                .get_key_value(name)
                .map(|(topic, entry)| vec![(topic.as_str(), entry)])
                .ok_or_else(|| Error::NotTopic(name.to_string())),
            None => Ok(topics
                .iter()
                .map(|(topic, entry)| (topic.as_str(), entry))
                .collect()),
        }
    }

    /// Start and announce both servers. On failure nothing of `name` stays
    /// announced or bound.
    async fn bring_up(&self, name: &str, entry: &TopicEntry<A>) -> Result<(), Error> {
        let Err(e) = self.try_bring_up(name, entry).await else {
            return Ok(());
        };

        warn!(topic = name, "failed to bring topic up: {e}");
        if let Err(e) = self.moderator.unpublish_topic(name).await {
            warn!(topic = name, "failed to withdraw partial announcement: {e}");
        }
        entry.readable.stop().await;
        entry.writeable.stop().await;
        Err(e)
    }

    async fn try_bring_up(&self, name: &str, entry: &TopicEntry<A>) -> Result<(), Error> {
        if !entry.readable.is_running() {
            entry.readable.start().await?;
        }
        if !entry.writeable.is_running() {
            entry.writeable.start().await?;
        }

        self.moderator
            .publish_role(name, Role::Producer, &entry.readable.address())
            .await?;
        self.moderator
            .publish_role(name, Role::Consumer, &entry.writeable.address())
            .await?;
        Ok(())
    }

    async fn bring_down(&self, name: &str, entry: &TopicEntry<A>) -> Result<(), Error> {
        self.moderator.unpublish_topic(name).await?;
        entry.readable.stop().await;
        entry.writeable.stop().await;
        Ok(())
    }
}

#[async_trait]
impl<A: StorageAdaptor, G: ServiceRegistry> Bootable for TopicNode<A, G> {
    type Error = Error;

    fn name(&self) -> String {
        "topic node".to_string()
    }

    async fn start(&self) -> Result<(), Self::Error> {
        self.moderator.start().await?;
        self.start_topics(None).await
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        info!("topic node shutting down...");

        let mut topics = self.topics.lock().await;
        for (name, entry) in topics.drain() {
            if let Err(e) = self.bring_down(&name, &entry).await {
                warn!(topic = %name, "failed to withdraw topic: {e}");
            }
        }
        drop(topics);

        self.moderator.stop().await?;
        self.adaptor.shutdown().await?;
        self.stopped.cancel();

        info!("topic node shutdown");
        Ok(())
    }

    async fn wait(&self) {
        self.stopped.cancelled().await;
    }
}
