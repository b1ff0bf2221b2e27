//! Relay Connection Handler
//!
//! Owns one connection from admission to teardown. The write loop drains the
//! outbound channel and drives keep-alive pings; the read loop handles each
//! inbound frame to completion before taking the next, which is what keeps
//! per-sender forwarding in arrival order.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

use super::dispatch::dispatch;
use super::protocol::{ClientFrame, FrameError, ServerFrame};
use super::state::{OUTBOUND_BUFFER, RelayState};
use crate::config::HandshakeFileConfig;
use crate::metrics::ServerMetrics;

/// Transport kind negotiated for every connection this server accepts.
const TRANSPORT_KIND: &str = "websocket";

/// Handle one relay WebSocket connection.
pub async fn handle_relay_ws(
    socket: WebSocket,
    state: Arc<RelayState>,
    metrics: Arc<ServerMetrics>,
    handshake: HandshakeFileConfig,
) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(id = %connection_id, transport = TRANSPORT_KIND, "client connected");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending frames to the WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    state.admit(&connection_id, tx.clone()).await;

    // Write loop: outbound frames and keep-alive pings share the sink
    let ping_interval = handshake.ping_interval();
    let sender_task = async move {
        let mut ping = interval(ping_interval);
        // the first tick fires immediately; skip it
        ping.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    let json = match serde_json::to_string(&frame) {
                        Ok(j) => j,
                        Err(e) => {
                            error!("Failed to serialize frame: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    // Read loop: resolves to the disconnect reason
    let tx_replies = tx.clone();
    let state_in = state.clone();
    let metrics_in = metrics.clone();
    let conn = connection_id.clone();
    let idle_timeout = handshake.idle_timeout();
    let input_task = async move {
        loop {
            let msg = match timeout(idle_timeout, ws_receiver.next()).await {
                Ok(Some(m)) => m,
                Ok(None) => return "transport closed".to_string(),
                // nothing read within the idle window, not even a pong
                Err(_) => return "ping timeout".to_string(),
            };
            match msg {
                Ok(Message::Text(text)) => match ClientFrame::parse(&text) {
                    Ok(frame) => {
                        let ack = dispatch(&state_in, &metrics_in, &conn, &frame).await;
                        if let Some(id) = frame.ack {
                            metrics_in.ack_sent();
                            if tx_replies
                                .send(ServerFrame::Ack { id, data: ack })
                                .await
                                .is_err()
                            {
                                return "transport closed".to_string();
                            }
                        }
                    }
                    Err(e) => {
                        metrics_in.frame_error();
                        warn!(id = %conn, "rejecting inbound frame: {}", e);
                        let _ = tx_replies
                            .send(ServerFrame::Error {
                                message: e.to_string(),
                            })
                            .await;
                    }
                },
                Ok(Message::Binary(_)) => {
                    metrics_in.frame_error();
                    warn!(id = %conn, "rejecting binary frame");
                    let _ = tx_replies
                        .send(ServerFrame::Error {
                            message: FrameError::Binary.to_string(),
                        })
                        .await;
                }
                Ok(Message::Close(frame)) => {
                    debug!(id = %conn, "client closed connection");
                    return frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "client disconnect".to_string());
                }
                // Pings and pongs refresh the idle deadline; axum answers
                // client pings on its own
                Ok(_) => {}
                Err(e) => {
                    // Transport-level error: log it and let the disconnect
                    // path that follows do the teardown. Other connections
                    // are unaffected.
                    metrics_in.websocket_error();
                    error!(id = %conn, "websocket error: {}", e);
                    return "transport error".to_string();
                }
            }
        }
    };

    let reason = tokio::select! {
        _ = sender_task => "transport closed".to_string(),
        reason = input_task => reason,
    };

    // Disconnect: report the last known name, then drop the registry entry
    // and the peer channel. Teardown is idempotent.
    let name = state.registry.lookup(&connection_id).await;
    info!(id = %connection_id, name = %name, reason = %reason, "client disconnected");
    state.teardown(&connection_id).await;
    metrics.connection_closed();
}
