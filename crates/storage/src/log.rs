//! Append-only log abstraction
//!
//! A log is an ordered sequence of opaque records addressed by a zero-based
//! index. Entries are never mutated or removed, so an index handed out by
//! [`Storage::append`] stays valid for the lifetime of the log and readers
//! only ever observe a prefix of what has been written.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Requested index is past the end of the log
    #[error("index {index} out of range (length {length})")]
    OutOfRange {
        /// The index that was requested
        index: u64,
        /// The length of the log at the time of the request
        length: u64,
    },

    /// Storage backend error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only log of opaque records
///
/// Implementations must be safe for concurrent appenders and readers inside
/// one process: appends are serialized so that every call receives a distinct
/// index equal to the previous length.
#[async_trait]
pub trait Storage: Clone + Debug + Send + Sync + 'static {
    /// Append a record and return its index
    async fn append(&self, record: Bytes) -> StorageResult<u64>;

    /// Number of records in the log, never decreases
    async fn len(&self) -> StorageResult<u64>;

    /// Fetch the record at `index`
    ///
    /// Fails with [`StorageError::OutOfRange`] when `index >= len()`.
    async fn get(&self, index: u64) -> StorageResult<Bytes>;

    /// Whether the log holds no records
    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Implement Storage for Arc<T> where T: Storage
#[async_trait]
impl<T: Storage> Storage for std::sync::Arc<T> {
    async fn append(&self, record: Bytes) -> StorageResult<u64> {
        (**self).append(record).await
    }

    async fn len(&self) -> StorageResult<u64> {
        (**self).len().await
    }

    async fn get(&self, index: u64) -> StorageResult<Bytes> {
        (**self).get(index).await
    }
}
