use bytes::Bytes;
use std::collections::HashSet;
use tempfile::TempDir;
use topicmesh_storage::{Storage, StorageAdaptor, StorageError};
use topicmesh_storage_rocksdb::{RocksDbAdaptor, RocksDbConfig};

#[tokio::test]
async fn test_basic_operations() {
    let _ = tracing_subscriber::fmt::try_init();

    let temp_dir = TempDir::new().unwrap();
    let adaptor = RocksDbAdaptor::open(RocksDbConfig::new(temp_dir.path()))
        .await
        .unwrap();
    let storage = adaptor.open("test_basic").await.unwrap();

    assert!(storage.is_empty().await.unwrap());

    assert_eq!(storage.append(Bytes::from("entry 0")).await.unwrap(), 0);
    assert_eq!(storage.append(Bytes::from("entry 1")).await.unwrap(), 1);
    assert_eq!(storage.append(Bytes::from("entry 2")).await.unwrap(), 2);

    assert_eq!(storage.len().await.unwrap(), 3);
    assert_eq!(storage.get(0).await.unwrap(), Bytes::from("entry 0"));
    assert_eq!(storage.get(2).await.unwrap(), Bytes::from("entry 2"));

    assert!(matches!(
        storage.get(3).await,
        Err(StorageError::OutOfRange {
            index: 3,
            length: 3
        })
    ));
}

#[tokio::test]
async fn test_persistence_across_restarts() {
    let _ = tracing_subscriber::fmt::try_init();

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();

    // First instance - write data
    {
        let adaptor = RocksDbAdaptor::open(RocksDbConfig::new(&path)).await.unwrap();
        let storage = adaptor.open("test_persist").await.unwrap();

        storage.append(Bytes::from("persistent 0")).await.unwrap();
        storage.append(Bytes::from("persistent 1")).await.unwrap();

        adaptor.shutdown().await.unwrap();
    }

    // Second instance - read data and keep appending after the old tail
    {
        let adaptor = RocksDbAdaptor::open(RocksDbConfig::new(&path)).await.unwrap();
        let storage = adaptor.open("test_persist").await.unwrap();

        assert_eq!(storage.len().await.unwrap(), 2);
        assert_eq!(storage.get(1).await.unwrap(), Bytes::from("persistent 1"));

        assert_eq!(storage.append(Bytes::from("persistent 2")).await.unwrap(), 2);
    }
}

#[tokio::test]
async fn test_topics_are_isolated() {
    let _ = tracing_subscriber::fmt::try_init();

    let temp_dir = TempDir::new().unwrap();
    let adaptor = RocksDbAdaptor::open(RocksDbConfig::new(temp_dir.path()))
        .await
        .unwrap();

    let orders = adaptor.open("orders").await.unwrap();
    let payments = adaptor.open("payments").await.unwrap();

    orders.append(Bytes::from("o-1")).await.unwrap();

    assert_eq!(orders.len().await.unwrap(), 1);
    assert!(payments.is_empty().await.unwrap());

    // A second handle for the same topic shares the length counter
    let orders_again = adaptor.open("orders").await.unwrap();
    assert_eq!(orders_again.append(Bytes::from("o-2")).await.unwrap(), 1);
    assert_eq!(orders.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_appends() {
    let _ = tracing_subscriber::fmt::try_init();

    let temp_dir = TempDir::new().unwrap();
    let adaptor = RocksDbAdaptor::open(RocksDbConfig::new(temp_dir.path()))
        .await
        .unwrap();
    let storage = adaptor.open("concurrent").await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let storage = storage.clone();
        tasks.spawn(async move { storage.append(Bytes::from(format!("r{i}"))).await.unwrap() });
    }

    let mut indices = HashSet::new();
    while let Some(result) = tasks.join_next().await {
        assert!(indices.insert(result.unwrap()));
    }

    assert_eq!(indices.len(), 16);
    assert_eq!(storage.len().await.unwrap(), 16);
}
