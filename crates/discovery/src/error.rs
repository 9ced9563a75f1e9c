use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A topic address could not be resolved.
    #[error(transparent)]
    Address(#[from] topicmesh_topic::Error),

    /// A role property held something other than `producer` or `consumer`.
    #[error("invalid topic role: {0}")]
    InvalidRole(String),

    /// No record for the topic has been discovered (yet).
    #[error("topic {0} not available")]
    NotTopicAvailable(String),

    /// The registry backend failed.
    #[error("registry error: {0}")]
    Registry(String),
}
