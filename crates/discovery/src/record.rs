//! Records exchanged with a service registry
//!
//! A topic is announced as up to two DNS-SD instances of [`SERVICE_TYPE`],
//! one per [`Role`]. The instance label is `"<name> [<role>]"`, so the
//! full service name reads `"orders [producer]._http._tcp.local."` rather
//! than `"orders._http._tcp.local."`. A record published without a role
//! keeps the bare `"<name>"` label. Peers must not parse the label: the
//! raw topic name travels in [`TOPIC_PROPERTY`] and the role in
//! [`ROLE_PROPERTY`].

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use topicmesh_topic::{DEFAULT_SCHEME, TopicAddress};

use crate::Error;

/// Service type every topic endpoint registers under.
///
/// Instances carry a role suffix, see [`TopicRecord::instance_name`].
pub const SERVICE_TYPE: &str = "_http._tcp.local.";

/// Property marking a record as a topic endpoint.
pub const MARKER_PROPERTY: &str = "topicmesh";

/// Property holding the endpoint's [`Role`].
pub const ROLE_PROPERTY: &str = "role";

/// Property holding the raw topic name.
pub const TOPIC_PROPERTY: &str = "topic";

/// Property holding the websocket scheme.
pub const SCHEME_PROPERTY: &str = "scheme";

/// Which side of a topic an endpoint serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Producers dial it to push records into the topic.
    Producer,
    /// Consumers dial it to pull records out of the topic.
    Consumer,
}

impl Role {
    /// The property value for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }

    /// A property map carrying only this role.
    #[must_use]
    pub fn properties(self) -> HashMap<String, String> {
        HashMap::from([(ROLE_PROPERTY.to_string(), self.as_str().to_string())])
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producer" => Ok(Self::Producer),
            "consumer" => Ok(Self::Consumer),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

/// One service instance as a registry backend sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Instance label, unique within the service type.
    pub instance: String,
    /// Where the service listens.
    pub addresses: Vec<SocketAddr>,
    /// TXT properties.
    pub properties: HashMap<String, String>,
}

impl ServiceRecord {
    /// Whether the record carries the topic marker.
    #[must_use]
    pub fn is_topic(&self) -> bool {
        self.properties
            .get(MARKER_PROPERTY)
            .is_some_and(|marker| marker == "true")
    }
}

/// A topic endpoint found in the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicRecord {
    /// Topic name.
    pub name: String,
    /// The side the endpoint serves, if it said.
    pub role: Option<Role>,
    /// Reachable addresses of the endpoint.
    pub addresses: Vec<TopicAddress>,
    /// Every property published with the endpoint.
    pub properties: HashMap<String, String>,
}

impl TopicRecord {
    /// Instance label used for a topic endpoint: `"<name> [<role>]"`, or
    /// the bare name without a role.
    ///
    /// The label only keeps the two records of a topic apart; readers take
    /// the name from [`TOPIC_PROPERTY`].
    #[must_use]
    pub fn instance_name(name: &str, role: Option<Role>) -> String {
        match role {
            Some(role) => format!("{name} [{role}]"),
            None => name.to_string(),
        }
    }

    /// Interpret a registry record, `None` if it is not a topic endpoint.
    #[must_use]
    pub fn from_service(record: &ServiceRecord) -> Option<Self> {
        if !record.is_topic() {
            return None;
        }

        let name = record
            .properties
            .get(TOPIC_PROPERTY)
            .cloned()
            .unwrap_or_else(|| record.instance.clone());
        let role = record
            .properties
            .get(ROLE_PROPERTY)
            .and_then(|role| role.parse().ok());
        let scheme = record
            .properties
            .get(SCHEME_PROPERTY)
            .map_or(DEFAULT_SCHEME, String::as_str);

        let addresses = record
            .addresses
            .iter()
            .filter_map(|addr| {
                TopicAddress::unbound(scheme, addr.ip())
                    .ok()
                    .map(|address| address.with_socket_addr(*addr))
            })
            .collect();

        Some(Self {
            name,
            role,
            addresses,
            properties: record.properties.clone(),
        })
    }
}
