//! Publishing side of discovery

use std::collections::HashMap;

use tokio::sync::Mutex;
use topicmesh_topic::TopicAddress;
use tracing::{debug, info};

use crate::record::{MARKER_PROPERTY, ROLE_PROPERTY, SCHEME_PROPERTY, TOPIC_PROPERTY};
use crate::{Error, Role, ServiceRecord, ServiceRegistry, TopicRecord};

type RecordKey = (String, Option<Role>);

/// Announces local topic endpoints on a [`ServiceRegistry`].
///
/// Records are keyed by topic name and role, so one topic can announce a
/// producer and a consumer endpoint side by side.
#[derive(Debug)]
pub struct Moderator<G: ServiceRegistry> {
    registry: G,
    published: Mutex<HashMap<RecordKey, String>>,
}

impl<G: ServiceRegistry> Moderator<G> {
    /// Create a moderator that publishes on `registry`.
    pub fn new(registry: G) -> Self {
        Self {
            registry,
            published: Mutex::new(HashMap::new()),
        }
    }

    /// Open the registry.
    ///
    /// # Errors
    ///
    /// Fails if the registry backend cannot start.
    pub async fn start(&self) -> Result<(), Error> {
        self.registry.start().await.map_err(registry_error)
    }

    /// Withdraw every record and close the registry.
    ///
    /// # Errors
    ///
    /// Fails if the registry backend refuses.
    pub async fn stop(&self) -> Result<(), Error> {
        self.unpublish_topics().await?;
        self.registry.shutdown().await.map_err(registry_error)
    }

    /// Announce `name` at `address`.
    ///
    /// A `role` entry in `properties` tags the record. Returns `false`
    /// without touching the registry if the name and role are already
    /// published.
    ///
    /// # Errors
    ///
    /// Fails if the role is invalid, the address does not resolve, or the
    /// registry refuses the record.
    pub async fn publish_topic(
        &self,
        name: &str,
        address: &TopicAddress,
        properties: HashMap<String, String>,
    ) -> Result<bool, Error> {
        let role = properties
            .get(ROLE_PROPERTY)
            .map(|role| role.parse::<Role>())
            .transpose()?;

        let mut published = self.published.lock().await;
        let key = (name.to_string(), role);
        if published.contains_key(&key) {
            debug!(topic = name, ?role, "topic already published");
            return Ok(false);
        }

        let socket_addr = address.resolve().await?;
        let mut properties = properties;
        properties.insert(MARKER_PROPERTY.to_string(), "true".to_string());
        properties.insert(TOPIC_PROPERTY.to_string(), name.to_string());
        properties.insert(SCHEME_PROPERTY.to_string(), address.scheme().to_string());

        let instance = TopicRecord::instance_name(name, role);
        self.registry
            .register(ServiceRecord {
                instance: instance.clone(),
                addresses: vec![socket_addr],
                properties,
            })
            .await
            .map_err(registry_error)?;

        info!(topic = name, ?role, "published topic at {socket_addr}");
        published.insert(key, instance);
        Ok(true)
    }

    /// Announce `name` at `address` tagged with `role`.
    ///
    /// # Errors
    ///
    /// See [`Moderator::publish_topic`].
    pub async fn publish_role(
        &self,
        name: &str,
        role: Role,
        address: &TopicAddress,
    ) -> Result<bool, Error> {
        self.publish_topic(name, address, role.properties()).await
    }

    /// Withdraw every record of `name`, `false` if none was published.
    ///
    /// # Errors
    ///
    /// Fails if the registry refuses.
    pub async fn unpublish_topic(&self, name: &str) -> Result<bool, Error> {
        let mut published = self.published.lock().await;
        let keys: Vec<RecordKey> = published
            .keys()
            .filter(|(topic, _)| topic == name)
            .cloned()
            .collect();

        if keys.is_empty() {
            debug!(topic = name, "topic not published");
            return Ok(false);
        }

        for key in keys {
            if let Some(instance) = published.remove(&key) {
                self.registry
                    .unregister(&instance)
                    .await
                    .map_err(registry_error)?;
            }
        }

        info!(topic = name, "unpublished topic");
        Ok(true)
    }

    /// Withdraw every record.
    ///
    /// # Errors
    ///
    /// Fails if the registry refuses.
    pub async fn unpublish_topics(&self) -> Result<(), Error> {
        for name in self.published_topics().await {
            self.unpublish_topic(&name).await?;
        }
        Ok(())
    }

    /// Whether any record of `name` is published.
    pub async fn is_published(&self, name: &str) -> bool {
        self.published
            .lock()
            .await
            .keys()
            .any(|(topic, _)| topic == name)
    }

    /// Names with at least one published record, sorted.
    pub async fn published_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .published
            .lock()
            .await
            .keys()
            .map(|(topic, _)| topic.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// The registry records are published on.
    pub const fn registry(&self) -> &G {
        &self.registry
    }
}

fn registry_error<E: std::error::Error>(e: E) -> Error {
    Error::Registry(e.to_string())
}
