use topicmesh_topic::TopicConfig;

use crate::Interface;

/// Settings of a [`TopicNode`](crate::TopicNode).
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    /// Interface topic servers bind when none is given.
    pub interface: Interface,

    /// Settings passed to every topic server.
    pub topic: TopicConfig,
}

impl NodeConfig {
    /// Set the default interface.
    #[must_use]
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Set the topic server settings.
    #[must_use]
    pub fn with_topic(mut self, topic: TopicConfig) -> Self {
        self.topic = topic;
        self
    }
}
