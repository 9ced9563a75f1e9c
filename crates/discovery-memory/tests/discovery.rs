use std::collections::HashMap;
use std::time::Duration;

use topicmesh_discovery::{
    Error, Moderator, Role, ServiceRecord, ServiceRegistry, Witness, WitnessConfig,
};
use topicmesh_discovery_memory::MemoryRegistry;
use topicmesh_topic::TopicAddress;

fn address(port: u16) -> TopicAddress {
    TopicAddress::parse(&format!("ws://127.0.0.1:{port}")).unwrap()
}

fn eager_witness(registry: MemoryRegistry) -> Witness<MemoryRegistry> {
    Witness::new(
        registry,
        WitnessConfig::default().with_refresh_interval(Duration::ZERO),
    )
}

#[tokio::test]
async fn test_publish_is_idempotent() {
    let _ = tracing_subscriber::fmt::try_init();

    let registry = MemoryRegistry::new();
    let moderator = Moderator::new(registry.clone());
    moderator.start().await.unwrap();

    assert!(moderator.publish_topic("orders", &address(4000), HashMap::new()).await.unwrap());
    assert!(!moderator.publish_topic("orders", &address(4001), HashMap::new()).await.unwrap());
    assert_eq!(registry.len(), 1);

    let witness = eager_witness(registry.clone());
    let records = witness.lookup("orders").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].addresses, vec![address(4000)]);

    assert!(moderator.unpublish_topic("orders").await.unwrap());
    assert!(!moderator.unpublish_topic("orders").await.unwrap());
    assert!(!moderator.unpublish_topic("unknown").await.unwrap());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_one_topic_two_roles() {
    let _ = tracing_subscriber::fmt::try_init();

    let registry = MemoryRegistry::new();
    let moderator = Moderator::new(registry.clone());

    assert!(moderator.publish_role("orders", Role::Producer, &address(5000)).await.unwrap());
    assert!(moderator.publish_role("orders", Role::Consumer, &address(5001)).await.unwrap());
    assert!(!moderator.publish_role("orders", Role::Consumer, &address(5002)).await.unwrap());
    assert_eq!(registry.len(), 2);

    let witness = eager_witness(registry.clone());
    assert_eq!(witness.list_topics().await.unwrap(), vec!["orders".to_string()]);
    assert_eq!(
        witness.lookup_role("orders", Role::Producer).await.unwrap(),
        address(5000)
    );
    assert_eq!(
        witness.lookup_role("orders", Role::Consumer).await.unwrap(),
        address(5001)
    );

    moderator.stop().await.unwrap();
    assert!(!moderator.is_published("orders").await);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_witness_ignores_foreign_services() {
    let registry = MemoryRegistry::new();
    registry
        .register(ServiceRecord {
            instance: "printer".to_string(),
            addresses: vec!["127.0.0.1:631".parse().unwrap()],
            properties: HashMap::from([("role".to_string(), "producer".to_string())]),
        })
        .await
        .unwrap();

    let witness = eager_witness(registry);
    assert!(witness.list_topics().await.unwrap().is_empty());
    assert!(matches!(
        witness.lookup("printer").await,
        Err(Error::NotTopicAvailable(name)) if name == "printer"
    ));
}

#[tokio::test]
async fn test_witness_debounces_refresh() {
    let registry = MemoryRegistry::new();
    let moderator = Moderator::new(registry.clone());
    let witness = Witness::new(
        registry,
        WitnessConfig::default().with_refresh_interval(Duration::from_secs(3600)),
    );

    assert!(witness.list_topics().await.unwrap().is_empty());

    moderator.publish_role("late", Role::Producer, &address(6000)).await.unwrap();
    // still inside the refresh window, the cache answers
    assert!(witness.list_topics().await.unwrap().is_empty());
    assert!(witness.lookup("late").await.is_err());

    witness.invalidate().await;
    assert_eq!(witness.list_topics().await.unwrap(), vec!["late".to_string()]);
}

#[tokio::test]
async fn test_invalid_role_is_rejected() {
    let moderator = Moderator::new(MemoryRegistry::new());
    let properties = HashMap::from([("role".to_string(), "observer".to_string())]);

    assert!(matches!(
        moderator.publish_topic("orders", &address(7000), properties).await,
        Err(Error::InvalidRole(_))
    ));
    assert!(!moderator.is_published("orders").await);
}
