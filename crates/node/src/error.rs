use thiserror::Error;
use topicmesh_bootable::BootableError;
use topicmesh_storage::StorageError;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Discovery failed.
    #[error(transparent)]
    Discovery(#[from] topicmesh_discovery::Error),

    /// A worker is already running on the executable.
    #[error("executable already started")]
    ExecutableRunning,

    /// Some topics a deployment needs are not discoverable.
    #[error("topics not available: {}", .0.join(", "))]
    IncompleteTopics(Vec<String>),

    /// The bind interface could not be resolved.
    #[error("interface error: {0}")]
    Interface(String),

    /// The topic is not hosted by this node.
    #[error("topic {0} not found")]
    NotTopic(String),

    /// A handle was asked for the wrong role.
    #[error("handle {alias} is not a {expected}")]
    RoleMismatch {
        /// The handle's alias.
        alias: String,
        /// The role the caller wanted.
        expected: &'static str,
    },

    /// Provisioning a log failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A topic endpoint failed.
    #[error(transparent)]
    Topic(#[from] topicmesh_topic::Error),
}

impl BootableError for Error {}
