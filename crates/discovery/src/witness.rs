//! Discovering side of discovery

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use topicmesh_topic::TopicAddress;
use tracing::debug;

use crate::{Error, Role, ServiceRegistry, TopicRecord};

/// Witness settings.
#[derive(Clone, Copy, Debug)]
pub struct WitnessConfig {
    /// Minimum time between two registry queries.
    pub refresh_interval: Duration,
}

impl WitnessConfig {
    /// Set the refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct Cache {
    topics: HashMap<String, Vec<TopicRecord>>,
    next_refresh: Option<Instant>,
}

/// Finds topic endpoints announced on a [`ServiceRegistry`].
///
/// Results are cached and the registry is queried at most once per
/// refresh interval. Discovery is eventually consistent: a topic published
/// elsewhere may take a while to show up.
#[derive(Debug)]
pub struct Witness<G: ServiceRegistry> {
    registry: G,
    config: WitnessConfig,
    cache: Mutex<Cache>,
}

impl<G: ServiceRegistry> Witness<G> {
    /// Create a witness reading `registry`.
    pub fn new(registry: G, config: WitnessConfig) -> Self {
        Self {
            registry,
            config,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Open the registry.
    ///
    /// # Errors
    ///
    /// Fails if the registry backend cannot start.
    pub async fn start(&self) -> Result<(), Error> {
        self.registry
            .start()
            .await
            .map_err(|e| Error::Registry(e.to_string()))
    }

    /// Close the registry.
    ///
    /// # Errors
    ///
    /// Fails if the registry backend refuses.
    pub async fn stop(&self) -> Result<(), Error> {
        self.registry
            .shutdown()
            .await
            .map_err(|e| Error::Registry(e.to_string()))
    }

    /// Names of every discovered topic, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the registry cannot be queried.
    pub async fn list_topics(&self) -> Result<Vec<String>, Error> {
        let cache = self.refreshed().await?;
        let mut names: Vec<String> = cache.topics.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Every record announced for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopicAvailable`] if nothing is known for `name`.
    pub async fn lookup(&self, name: &str) -> Result<Vec<TopicRecord>, Error> {
        let cache = self.refreshed().await?;
        cache
            .topics
            .get(name)
            .filter(|records| !records.is_empty())
            .cloned()
            .ok_or_else(|| Error::NotTopicAvailable(name.to_string()))
    }

    /// Address of the `role` endpoint of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTopicAvailable`] if no such endpoint is known.
    pub async fn lookup_role(&self, name: &str, role: Role) -> Result<TopicAddress, Error> {
        self.lookup(name)
            .await?
            .into_iter()
            .filter(|record| record.role == Some(role))
            .find_map(|record| record.addresses.into_iter().next())
            .ok_or_else(|| Error::NotTopicAvailable(format!("{name} [{role}]")))
    }

    /// Force the next call to query the registry.
    pub async fn invalidate(&self) {
        self.cache.lock().await.next_refresh = None;
    }

    async fn refreshed(&self) -> Result<MutexGuard<'_, Cache>, Error> {
        let mut cache = self.cache.lock().await;
        let now = Instant::now();
        if cache.next_refresh.is_some_and(|deadline| now < deadline) {
            return Ok(cache);
        }

        let services = self
            .registry
            .discover()
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        let mut topics: HashMap<String, Vec<TopicRecord>> = HashMap::new();
        for record in services.iter().filter_map(TopicRecord::from_service) {
            topics.entry(record.name.clone()).or_default().push(record);
        }
        for records in topics.values_mut() {
            records.sort_by_key(|record| record.role);
        }

        debug!(topics = topics.len(), "discovery cache refreshed");
        cache.topics = topics;
        cache.next_refresh = Some(now + self.config.refresh_interval);
        Ok(cache)
    }
}
