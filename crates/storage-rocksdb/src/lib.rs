//! RocksDB log storage implementation
//!
//! One database holds every topic of a node; each topic gets its own column
//! family whose keys are the big-endian record index.

pub mod config;

pub use config::RocksDbConfig;

use async_trait::async_trait;
use bytes::Bytes;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use topicmesh_storage::{Storage, StorageAdaptor, StorageError, StorageResult};
use tracing::{debug, info};

type Db = DBWithThreadMode<MultiThreaded>;

/// Opens a RocksDB database and hands out one log per topic
#[derive(Clone)]
pub struct RocksDbAdaptor {
    /// The RocksDB instance
    db: Arc<Db>,
    config: RocksDbConfig,
    /// Open logs, so every handle of a topic shares one length counter
    logs: Arc<Mutex<HashMap<String, RocksDbStorage>>>,
}

impl RocksDbAdaptor {
    /// Open (or create) the database described by `config`
    pub async fn open(config: RocksDbConfig) -> StorageResult<Self> {
        let path_str = config
            .path
            .to_str()
            .ok_or_else(|| StorageError::Backend("Invalid path".to_string()))?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Reopen every existing column family, otherwise RocksDB refuses to open
        let cf_names = match Db::list_cf(&db_opts, path_str) {
            Ok(existing) if !existing.is_empty() => existing,
            _ => vec!["default".to_string()],
        };

        let cfs: Vec<ColumnFamilyDescriptor> = cf_names
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&db_opts, path_str, cfs)
            .map_err(|e| StorageError::Backend(format!("Failed to open RocksDB: {e}")))?;

        info!("opened rocksdb topic storage at {}", path_str);

        Ok(Self {
            db: Arc::new(db),
            config,
            logs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn column_family_name(&self, topic: &str) -> String {
        format!("{}{}", self.config.column_family_prefix, topic)
    }
}

impl std::fmt::Debug for RocksDbAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbAdaptor")
            .field("path", &self.config.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageAdaptor for RocksDbAdaptor {
    type Storage = RocksDbStorage;

    async fn open(&self, topic: &str) -> StorageResult<RocksDbStorage> {
        let mut logs = self.logs.lock().await;
        if let Some(storage) = logs.get(topic) {
            return Ok(storage.clone());
        }

        let storage = RocksDbStorage::open(self.db.clone(), self.column_family_name(topic))?;
        logs.insert(topic.to_string(), storage.clone());
        Ok(storage)
    }

    async fn shutdown(&self) -> StorageResult<()> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush database: {e}")))
    }
}

/// Persistent log for a single topic
#[derive(Clone)]
pub struct RocksDbStorage {
    db: Arc<Db>,
    cf_name: String,
    /// Length of the log; the lock also serializes appends
    length: Arc<Mutex<u64>>,
}

impl RocksDbStorage {
    fn open(db: Arc<Db>, cf_name: String) -> StorageResult<Self> {
        if db.cf_handle(&cf_name).is_none() {
            db.create_cf(&cf_name, &Options::default()).map_err(|e| {
                StorageError::Backend(format!("Failed to create column family: {e}"))
            })?;
        }

        let length = {
            let cf = Self::cf(&db, &cf_name)?;
            let mut iter = db.iterator_cf(&cf, IteratorMode::End);
            match iter.next() {
                Some(Ok((key, _))) => Self::decode_key(&key)? + 1,
                Some(Err(e)) => {
                    return Err(StorageError::Backend(format!(
                        "Failed to read last key: {e}"
                    )));
                }
                None => 0,
            }
        };

        debug!("opened column family {} with {} records", cf_name, length);

        Ok(Self {
            db,
            cf_name,
            length: Arc::new(Mutex::new(length)),
        })
    }

    fn cf<'a>(db: &'a Db, cf_name: &str) -> StorageResult<Arc<BoundColumnFamily<'a>>> {
        db.cf_handle(cf_name)
            .ok_or_else(|| StorageError::Backend(format!("Missing column family {cf_name}")))
    }

    /// Encode a log key for RocksDB
    fn encode_key(index: u64) -> [u8; 8] {
        index.to_be_bytes()
    }

    /// Decode a log key from RocksDB
    fn decode_key(key: &[u8]) -> StorageResult<u64> {
        let bytes: [u8; 8] = key
            .try_into()
            .map_err(|_| StorageError::InvalidKey("Invalid key length".to_string()))?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl std::fmt::Debug for RocksDbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbStorage")
            .field("cf_name", &self.cf_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Storage for RocksDbStorage {
    async fn append(&self, record: Bytes) -> StorageResult<u64> {
        let mut length = self.length.lock().await;
        let index = *length;

        let cf = Self::cf(&self.db, &self.cf_name)?;
        self.db
            .put_cf(&cf, Self::encode_key(index), record.as_ref())
            .map_err(|e| StorageError::Backend(format!("Failed to append record: {e}")))?;

        *length = index + 1;
        Ok(index)
    }

    async fn len(&self) -> StorageResult<u64> {
        Ok(*self.length.lock().await)
    }

    async fn get(&self, index: u64) -> StorageResult<Bytes> {
        let length = self.len().await?;
        if index >= length {
            return Err(StorageError::OutOfRange { index, length });
        }

        let cf = Self::cf(&self.db, &self.cf_name)?;
        match self.db.get_cf(&cf, Self::encode_key(index)) {
            Ok(Some(value)) => Ok(Bytes::from(value)),
            Ok(None) => Err(StorageError::Backend(format!(
                "Record {index} missing below length {length}"
            ))),
            Err(e) => Err(StorageError::Backend(format!("Failed to read record: {e}"))),
        }
    }
}
