//! Append-only storage traits for topicmesh topics
//!
//! A topic's records live in a [`Storage`]: an ordered log that only ever
//! grows. Backends are provisioned per topic through a [`StorageAdaptor`].

pub mod adaptor;
pub mod log;

pub use adaptor::StorageAdaptor;
pub use log::{Storage, StorageError, StorageResult};
