//! Router loss on real Zenoh client sessions.
//!
//! Note: Zenoh requires multi-thread tokio runtime.

use std::time::Duration;

use fleetbridge_framework::bus::{BusHandle, Connector, SupplyStream};
use fleetbridge_framework::zenoh_bus::ZenohConnector;
use fleetbridge_framework::{ErrorKind, ZenohConfig};

const ROUTER: &str = "127.0.0.1:17491";

fn unique_key() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}/ride_share", nanos)
}

async fn open_router(address: &str) -> zenoh::Session {
    let config = ZenohConfig {
        mode: "router".to_string(),
        connect: Vec::new(),
        listen: vec![format!("tcp/{}", address)],
    };
    fleetbridge_common::connect(&config)
        .await
        .expect("Failed to open router")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_router_loss_fails_publish_and_stream() {
    let router = open_router(ROUTER).await;
    let key = unique_key();

    let connector = ZenohConnector::default().with_router_check(Duration::from_millis(100));
    let publisher = connector.connect(ROUTER).await.expect("publish connect");
    let subscriber = connector.connect(ROUTER).await.expect("subscribe connect");
    assert!(publisher.is_connected().await);

    let mut stream = subscriber.subscribe(&key).await.expect("subscribe");

    // Give the subscriber declaration time to reach the router
    tokio::time::sleep(Duration::from_millis(500)).await;

    publisher.notify(&key, vec![1, 2, 3]).await.expect("notify");
    let received = tokio::time::timeout(Duration::from_secs(5), stream.next_supply())
        .await
        .expect("Timeout waiting for supply")
        .expect("stream error");
    assert_eq!(received, Some(vec![1, 2, 3]));

    router.close().await.expect("Failed to close router");

    let ended = tokio::time::timeout(Duration::from_secs(5), stream.next_supply())
        .await
        .expect("stream did not notice the router going away");
    assert_eq!(ended.unwrap_err().kind(), ErrorKind::Stream);

    tokio::time::timeout(Duration::from_secs(5), async {
        while publisher.is_connected().await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("publish session still reports a router");

    let err = publisher.notify(&key, vec![4]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Publish);
}

