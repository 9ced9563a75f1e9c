use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use topicmesh_storage_memory::MemoryStorage;
use topicmesh_topic::{
    Error, RedeableClient, RedeableServer, TopicAddress, TopicConfig, TopicQueue,
    WriteableClient, WriteableServer,
};

const WAIT: Duration = Duration::from_secs(5);

fn loopback() -> TopicAddress {
    TopicAddress::unbound("ws", IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap()
}

fn config() -> TopicConfig {
    TopicConfig::default().with_ready_timeout(Duration::from_millis(100))
}

fn queue() -> Arc<TopicQueue<MemoryStorage>> {
    TopicQueue::shared(MemoryStorage::new())
}

#[tokio::test]
async fn test_writeable_server_to_redeable_client() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = WriteableServer::writeable("orders", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();

    let client = RedeableClient::redeable("orders", queue(), server.address(), config())
        .await
        .unwrap();
    client.start().await.unwrap();

    server.put("x").await.unwrap();
    let received = timeout(WAIT, client.get()).await.unwrap().unwrap();
    assert_eq!(received, "x");

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_writeable_clients_share_group_into_redeable_server() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = RedeableServer::redeable("events", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();
    let address = server.address().with_group("A");

    let mut clients = Vec::new();
    let mut expected = HashSet::new();
    for i in 0..3 {
        let client = WriteableClient::writeable("events", queue(), address.clone(), config())
            .await
            .unwrap();
        client.start().await.unwrap();
        for j in 0..2 {
            let record = format!("client-{i}-record-{j}");
            client.put(record.clone()).await.unwrap();
            expected.insert(record);
        }
        clients.push(client);
    }

    let mut received = HashSet::new();
    for _ in 0..6 {
        let record = timeout(WAIT, server.get()).await.unwrap().unwrap();
        assert!(received.insert(record), "record delivered twice");
    }
    assert_eq!(received, expected);

    for client in &clients {
        client.stop().await;
    }
    server.stop().await;
}

#[tokio::test]
async fn test_one_writeable_server_many_redeable_clients() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = WriteableServer::writeable("jobs", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();
    let address = server.address().with_group("A");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut clients = Vec::new();
    let mut readers = Vec::new();
    for _ in 0..3 {
        let client = Arc::new(
            RedeableClient::redeable("jobs", queue(), address.clone(), config())
                .await
                .unwrap(),
        );
        client.start().await.unwrap();

        let reader = client.clone();
        let tx = tx.clone();
        readers.push(tokio::spawn(async move {
            while let Ok(record) = reader.get().await {
                if tx.send(record).is_err() {
                    break;
                }
            }
        }));
        clients.push(client);
    }

    timeout(WAIT, server.wait_for_peers(3)).await.unwrap();

    let expected: HashSet<_> = (0..6).map(|i| format!("job-{i}")).collect();
    for record in &expected {
        server.put(record.clone()).await.unwrap();
    }

    let mut received = HashSet::new();
    for _ in 0..6 {
        let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(received.insert(record), "record delivered twice");
    }
    assert_eq!(received, expected);

    for reader in readers {
        reader.abort();
    }
    for client in &clients {
        client.stop().await;
    }
    server.stop().await;
}

#[tokio::test]
async fn test_burst_is_delivered_in_order() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = RedeableServer::redeable("burst", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();

    let client = WriteableClient::writeable("burst", queue(), server.address(), config())
        .await
        .unwrap();
    for i in 0..20 {
        client.put(format!("{i}")).await.unwrap();
    }
    client.start().await.unwrap();

    for i in 0..20 {
        let record = timeout(WAIT, server.get()).await.unwrap().unwrap();
        assert_eq!(record, format!("{i}"));
    }

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_stopping_redeable_client_releases_peer() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = WriteableServer::writeable("leave", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();

    let client = RedeableClient::redeable("leave", queue(), server.address(), config())
        .await
        .unwrap();
    client.start().await.unwrap();
    timeout(WAIT, server.wait_for_peers(1)).await.unwrap();

    client.stop().await;
    assert!(!client.is_connected());

    timeout(WAIT, async {
        while server.role().ready_peers() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_server_stop_refuses_connections() {
    let _ = tracing_subscriber::fmt::try_init();

    let configured = loopback();
    let server = RedeableServer::redeable("gone", queue(), configured.clone(), config())
        .await
        .unwrap();
    server.start().await.unwrap();
    assert!(matches!(server.start().await, Err(Error::AlreadyStarted)));

    let bound = server.address();
    assert_ne!(bound.port(), 0);

    server.stop().await;
    assert!(!server.is_running());
    assert_eq!(server.address(), configured);

    let client = WriteableClient::writeable("gone", queue(), bound, config())
        .await
        .unwrap();
    assert!(client.start().await.is_err());
}

#[tokio::test]
async fn test_writeable_client_stop_flushes_queued_records() {
    let _ = tracing_subscriber::fmt::try_init();

    let server = RedeableServer::redeable("audit", queue(), loopback(), config())
        .await
        .unwrap();
    server.start().await.unwrap();

    for i in 0..20 {
        let client = WriteableClient::writeable("audit", queue(), server.address(), config())
            .await
            .unwrap();
        client.start().await.unwrap();
        client.put(format!("r{i}-a")).await.unwrap();
        client.put(format!("r{i}-b")).await.unwrap();
        client.stop().await;

        for suffix in ["a", "b"] {
            let record = timeout(WAIT, server.get()).await.unwrap().unwrap();
            assert_eq!(record, format!("r{i}-{suffix}"));
        }
    }

    server.stop().await;
}
