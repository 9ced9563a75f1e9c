//! RocksDB configuration

use std::path::PathBuf;

/// Configuration for RocksDB storage
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the RocksDB database
    pub path: PathBuf,

    /// Prefix prepended to topic names to build column family names
    pub column_family_prefix: String,
}

impl RocksDbConfig {
    /// Create a new configuration with the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            column_family_prefix: "topic:".to_string(),
        }
    }

    /// Override the column family prefix
    #[must_use]
    pub fn with_column_family_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.column_family_prefix = prefix.into();
        self
    }
}
