//! Stream client lifecycle integration tests.
//!
//! Covers connection establishment, event delivery, reconnect scheduling
//! after an abrupt close, and disconnect during a pending reconnect delay.

mod common;
use common::MockStreamServer;

use keeper_stream::{EventStreamClient, StreamConfig, StreamEvent, StreamState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn test_config(url: String, reconnect_delay_ms: u64) -> StreamConfig {
    StreamConfig {
        url,
        reconnect_delay_ms,
        handshake_timeout_ms: 2000,
        ..Default::default()
    }
}

async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(3), async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn test_connect_announces_subscription() {
    let server = MockStreamServer::start().await;
    let (tx, _rx) = mpsc::channel(16);
    let client = Arc::new(EventStreamClient::new(
        test_config(server.url(), 200),
        tx,
    ));

    client.connect().await.expect("first attempt should succeed");
    assert_eq!(client.state(), StreamState::Connected);

    let messages = server.received_messages().await;
    assert!(
        messages.iter().any(|m| m.contains("subscribe")),
        "subscription announcement should be the first frame"
    );

    client.disconnect();
    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_rejects_when_unreachable() {
    let (tx, _rx) = mpsc::channel(16);
    // Port 1 is never listening.
    let client = Arc::new(EventStreamClient::new(
        test_config("ws://127.0.0.1:1".to_string(), 200),
        tx,
    ));

    let result = client.connect().await;
    assert!(result.is_err(), "first-attempt failure must surface");
    assert_eq!(client.state(), StreamState::Disconnected);
}

#[tokio::test]
async fn test_connect_rejects_mismatched_subscription_ack() {
    let server = MockStreamServer::start_acking_channels(&["something-else"]).await;
    let (tx, _rx) = mpsc::channel(16);
    let client = Arc::new(EventStreamClient::new(test_config(server.url(), 200), tx));

    let result = client.connect().await;
    assert!(
        result.is_err(),
        "an ack that names the wrong channels must fail the connect"
    );
    assert_eq!(client.state(), StreamState::Disconnected);

    server.shutdown().await;
}

#[tokio::test]
async fn test_events_are_forwarded() {
    let server = MockStreamServer::start().await;
    let (tx, mut rx) = mpsc::channel(16);
    let client = Arc::new(EventStreamClient::new(
        test_config(server.url(), 200),
        tx,
    ));
    client.connect().await.unwrap();

    server
        .push(
            r#"{
                "type": "opportunity-observed",
                "opportunity": {
                    "id": "q-55",
                    "chain": "testnet",
                    "kind": "rfq",
                    "payload": {"asset": "USDC", "size": "750", "side": "buy"}
                }
            }"#,
        )
        .await;
    // Unknown tags must be dropped without closing the connection.
    server.push(r#"{"type": "totally-unknown"}"#).await;
    server
        .push(r#"{"type": "opportunity-resolved", "kind": "rfq", "id": "q-56"}"#)
        .await;

    let first = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("observed event should arrive")
        .unwrap();
    match first {
        StreamEvent::Observed(op) => assert_eq!(op.id, "q-55"),
        other => panic!("expected observed, got {other:?}"),
    }

    let second = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("resolved event should arrive")
        .unwrap();
    match second {
        StreamEvent::Resolved(id) => assert_eq!(id.raw, "q-56"),
        other => panic!("expected resolved, got {other:?}"),
    }

    client.disconnect();
    server.shutdown().await;
}

#[tokio::test]
async fn test_abrupt_close_schedules_exactly_one_reconnect() {
    let server = MockStreamServer::start().await;
    let (tx, _rx) = mpsc::channel(16);
    let client = Arc::new(EventStreamClient::new(
        test_config(server.url(), 100),
        tx,
    ));
    client.connect().await.unwrap();
    assert_eq!(server.connection_count().await, 1);

    server.kill_connections().await;

    // One reconnect should land after the fixed delay.
    wait_for("reconnect", || async {
        server.connection_count().await == 2
    })
    .await;
    wait_for("connected state", || async {
        client.state() == StreamState::Connected
    })
    .await;

    // And only one: give several delay windows and confirm no extra attempts.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        server.connection_count().await,
        2,
        "a healthy reconnected stream must not keep dialing"
    );
    assert_eq!(client.reconnect_count(), 1);

    client.disconnect();
    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_during_pending_delay_cancels_reconnect() {
    let server = MockStreamServer::start().await;
    let (tx, _rx) = mpsc::channel(16);
    let client = Arc::new(EventStreamClient::new(
        test_config(server.url(), 400),
        tx,
    ));
    client.connect().await.unwrap();

    server.kill_connections().await;
    // The reconnect timer is now pending; disconnect before it fires.
    wait_for("reconnecting state", || async {
        client.state() == StreamState::Reconnecting
    })
    .await;
    client.disconnect();

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(
        server.connection_count().await,
        1,
        "cancelled reconnect must never fire"
    );
    assert_eq!(client.state(), StreamState::Disconnected);

    server.shutdown().await;
}
