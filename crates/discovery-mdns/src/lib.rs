//! Multicast DNS service registry
//!
//! Registers topic endpoints as DNS-SD instances and keeps a live view of
//! every instance of the configured service type, fed by a background
//! browse task.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;

pub use config::MdnsConfig;
pub use error::Error;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use topicmesh_discovery::{ServiceRecord, ServiceRegistry};
use tracing::{debug, info, warn};

/// Registry backed by multicast DNS.
#[derive(Clone, Debug)]
pub struct MdnsRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    config: MdnsConfig,
    daemon: Mutex<Option<ServiceDaemon>>,
    browse_task: Mutex<Option<JoinHandle<()>>>,
    discovered: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdnsRegistry")
            .field("config", &self.config)
            .field("started", &self.daemon.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl MdnsRegistry {
    /// Create a registry, nothing touches the network before `start`.
    #[must_use]
    pub fn new(config: MdnsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                daemon: Mutex::new(None),
                browse_task: Mutex::new(None),
                discovered: Arc::new(RwLock::new(HashMap::new())),
            }),
        }
    }

    fn daemon(&self) -> Result<ServiceDaemon, Error> {
        self.inner.daemon.lock().clone().ok_or(Error::NotStarted)
    }

    fn fullname(&self, instance: &str) -> String {
        format!("{instance}.{}", self.inner.config.service_type)
    }

    fn host_name(&self, instance: &str) -> String {
        if let Some(host_name) = &self.inner.config.host_name {
            return host_name.clone();
        }

        let label: String = instance
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{}.local.", label.trim_matches('-'))
    }
}

fn to_record(info: &ServiceInfo, service_type: &str) -> ServiceRecord {
    let fullname = info.get_fullname();
    let instance = fullname
        .strip_suffix(service_type)
        .and_then(|name| name.strip_suffix('.'))
        .unwrap_or(fullname)
        .to_string();

    let port = info.get_port();
    let addresses = info
        .get_addresses()
        .iter()
        .map(|ip| SocketAddr::new(*ip, port))
        .collect();

    let properties = info
        .get_properties()
        .iter()
        .map(|property| (property.key().to_string(), property.val_str().to_string()))
        .collect();

    ServiceRecord {
        instance,
        addresses,
        properties,
    }
}

#[async_trait]
impl ServiceRegistry for MdnsRegistry {
    type Error = Error;

    async fn start(&self) -> Result<(), Self::Error> {
        let mut daemon_slot = self.inner.daemon.lock();
        if daemon_slot.is_some() {
            return Ok(());
        }

        let daemon = ServiceDaemon::new()?;
        let events = daemon.browse(&self.inner.config.service_type)?;
        let discovered = self.inner.discovered.clone();
        let service_type = self.inner.config.service_type.clone();

        let browse_task = tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let record = to_record(&info, &service_type);
                        debug!(instance = %record.instance, "service resolved");
                        discovered.write().insert(record.instance.clone(), record);
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        debug!(fullname, "service removed");
                        if let Some(instance) = fullname
                            .strip_suffix(service_type.as_str())
                            .and_then(|name| name.strip_suffix('.'))
                        {
                            discovered.write().remove(instance);
                        }
                    }
                    _ => {}
                }
            }
            debug!("mdns browse ended");
        });

        *self.inner.browse_task.lock() = Some(browse_task);
        *daemon_slot = Some(daemon);
        drop(daemon_slot);

        info!(service_type = %self.inner.config.service_type, "mdns registry started");
        Ok(())
    }

    async fn register(&self, record: ServiceRecord) -> Result<(), Self::Error> {
        let daemon = self.daemon()?;
        let port = record
            .addresses
            .first()
            .map(SocketAddr::port)
            .ok_or_else(|| Error::NoAddress(record.instance.clone()))?;
        let ips: Vec<IpAddr> = record.addresses.iter().map(SocketAddr::ip).collect();

        let info = ServiceInfo::new(
            &self.inner.config.service_type,
            &record.instance,
            &self.host_name(&record.instance),
            &ips[..],
            port,
            record.properties,
        )?;
        daemon.register(info)?;

        debug!(instance = %record.instance, "registered mdns service");
        Ok(())
    }

    async fn unregister(&self, instance: &str) -> Result<(), Self::Error> {
        let daemon = self.daemon()?;
        let status = daemon.unregister(&self.fullname(instance))?;
        if let Err(e) = status.recv_async().await {
            warn!(instance, "no unregister confirmation: {e}");
        }

        debug!(instance, "unregistered mdns service");
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<ServiceRecord>, Self::Error> {
        Ok(self.inner.discovered.read().values().cloned().collect())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        let Some(daemon) = self.inner.daemon.lock().take() else {
            return Ok(());
        };

        if let Some(browse_task) = self.inner.browse_task.lock().take() {
            browse_task.abort();
        }
        daemon.shutdown()?;
        self.inner.discovered.write().clear();

        info!("mdns registry shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use topicmesh_discovery::{Moderator, Role, Witness, WitnessConfig};
    use topicmesh_topic::TopicAddress;

    #[test]
    fn test_host_name_is_a_local_label() {
        let registry = MdnsRegistry::new(MdnsConfig::default());
        assert_eq!(registry.host_name("orders [producer]"), "orders--producer.local.");
    }

    #[tokio::test]
    async fn test_register_requires_start() {
        let registry = MdnsRegistry::new(MdnsConfig::default());
        let result = registry
            .register(ServiceRecord {
                instance: "orders".to_string(),
                addresses: vec!["127.0.0.1:4000".parse().unwrap()],
                properties: HashMap::new(),
            })
            .await;
        assert!(matches!(result, Err(Error::NotStarted)));
    }

    #[tokio::test]
    #[ignore = "requires multicast on the host network"]
    async fn test_publish_and_discover_over_mdns() {
        let _ = tracing_subscriber::fmt::try_init();

        let moderator = Moderator::new(MdnsRegistry::new(MdnsConfig::default()));
        moderator.start().await.unwrap();
        let witness = Witness::new(
            MdnsRegistry::new(MdnsConfig::default()),
            WitnessConfig::default().with_refresh_interval(Duration::ZERO),
        );
        witness.start().await.unwrap();

        let address = TopicAddress::parse("ws://127.0.0.1:45678").unwrap();
        assert!(moderator.publish_role("mdns-test", Role::Producer, &address).await.unwrap());

        let mut found = None;
        for _ in 0..50 {
            if let Ok(address) = witness.lookup_role("mdns-test", Role::Producer).await {
                found = Some(address);
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(found.map(|address| address.port()), Some(45678));

        moderator.stop().await.unwrap();
        witness.stop().await.unwrap();
    }
}
