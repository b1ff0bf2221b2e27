//! End-to-end relay tests: a real listener on a random port driven by real
//! WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;

use crate::config::FileConfig;
use crate::metrics::ServerMetrics;
use crate::ws::RelayState;
use crate::{AppState, build_router};

/// Timeout for each async operation in tests.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Window in which "receives nothing" is asserted.
const QUIET_WINDOW: Duration = Duration::from_millis(300);

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a relay server on 127.0.0.1:0, return its address.
async fn start_server() -> SocketAddr {
    let state = AppState {
        relay: Arc::new(RelayState::new()),
        metrics: Arc::new(ServerMetrics::new()),
        config: Arc::new(FileConfig::default()),
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (client, _) = timeout(
        TEST_TIMEOUT,
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws")),
    )
    .await
    .expect("connect timed out")
    .expect("failed to connect");
    client
}

async fn health(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("health request failed")
        .json()
        .await
        .expect("health response is not JSON")
}

/// Poll /health until the server reports `expected` active connections.
/// Admission runs after the upgrade response, so a freshly-connected client
/// may not be in the peer map yet.
async fn wait_for_connections(addr: SocketAddr, expected: u64) {
    timeout(TEST_TIMEOUT, async {
        loop {
            if health(addr).await["connections"] == json!(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server never reported the expected connection count");
}

async fn send_event(client: &mut WsClient, event: &str, payload: Value, ack: Option<u64>) {
    let mut frame = json!({ "event": event, "payload": payload });
    if let Some(id) = ack {
        frame["ack"] = json!(id);
    }
    client
        .send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("failed to send frame");
}

/// Next JSON frame, skipping transport control frames.
async fn recv_frame(client: &mut WsClient) -> Value {
    timeout(TEST_TIMEOUT, async {
        loop {
            let msg = client
                .next()
                .await
                .expect("stream ended")
                .expect("websocket error");
            if let tungstenite::Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).expect("frame is not JSON");
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

/// Assert that no relay frame arrives within the quiet window.
async fn assert_silent(client: &mut WsClient) {
    let got = timeout(QUIET_WINDOW, async {
        loop {
            match client.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => return text.to_string(),
                // control frames are fine
                Some(Ok(_)) => {}
                Some(Err(_)) | None => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(got.is_err(), "expected silence, got frame: {got:?}");
}

#[tokio::test]
async fn relay_reaches_peers_but_not_sender() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_connections(addr, 3).await;

    send_event(&mut a, "chat", json!({"text": "hi"}), None).await;

    for client in [&mut b, &mut c] {
        let frame = recv_frame(client).await;
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["event"], "chat");
        assert_eq!(frame["payload"], json!({"text": "hi"}));
    }
    // no ack was requested, so the sender hears nothing at all
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn register_ack_and_teardown() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    wait_for_connections(addr, 1).await;

    send_event(&mut a, "register", json!({"name": "dashboard"}), Some(1)).await;

    let frame = recv_frame(&mut a).await;
    assert_eq!(frame["type"], "ack");
    assert_eq!(frame["id"], 1);
    assert_eq!(frame["data"]["status"], "registered");
    assert_eq!(frame["data"]["clientType"], "dashboard");
    assert!(
        frame["data"]["id"].as_str().is_some_and(|s| !s.is_empty()),
        "ack must carry the connection id"
    );

    assert_eq!(health(addr).await["registered_clients"], json!(1));

    a.close(None).await.expect("close failed");
    wait_for_connections(addr, 0).await;
    assert_eq!(health(addr).await["registered_clients"], json!(0));
}

#[tokio::test]
async fn register_prefers_client_type_over_name() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    wait_for_connections(addr, 1).await;

    send_event(
        &mut a,
        "register",
        json!({"clientType": "camera", "name": "ignored"}),
        Some(2),
    )
    .await;

    let frame = recv_frame(&mut a).await;
    assert_eq!(frame["data"]["clientType"], "camera");
}

#[tokio::test]
async fn register_is_not_relayed() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_connections(addr, 2).await;

    send_event(&mut a, "register", json!({"name": "camera"}), None).await;

    assert_silent(&mut b).await;
    // fire-and-forget: no ack slot, no reply either
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn solo_event_acks_forwarded() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    wait_for_connections(addr, 1).await;

    send_event(&mut a, "ping", json!({}), Some(7)).await;

    let frame = recv_frame(&mut a).await;
    assert_eq!(frame["type"], "ack");
    assert_eq!(frame["id"], 7);
    assert_eq!(frame["data"]["status"], "forwarded");
    assert_eq!(frame["data"]["event"], "ping");
}

#[tokio::test]
async fn malformed_frame_gets_error_reply() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    wait_for_connections(addr, 1).await;

    a.send(tungstenite::Message::Text("not json".into()))
        .await
        .expect("failed to send");

    let frame = recv_frame(&mut a).await;
    assert_eq!(frame["type"], "error");

    // the connection survives the bad frame
    send_event(&mut a, "ping", json!({}), Some(9)).await;
    let frame = recv_frame(&mut a).await;
    assert_eq!(frame["type"], "ack");
    assert_eq!(frame["id"], 9);
}

#[tokio::test]
async fn http_probe_surface() {
    let addr = start_server().await;

    let resp = reqwest::get(format!("http://{addr}/"))
        .await
        .expect("probe request failed");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Relay server running");

    let body = health(addr).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], json!(0));

    let metrics: Value = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .expect("metrics request failed")
        .json()
        .await
        .expect("metrics response is not JSON");
    assert!(metrics["relay"]["events_received"].is_u64());
}
