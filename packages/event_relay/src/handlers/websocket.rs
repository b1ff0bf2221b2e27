use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Upgrade into the relay protocol. Every accepted socket becomes one
/// connection with a fresh identifier.
pub async fn relay_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let relay = state.relay.clone();
    let metrics = state.metrics.clone();
    let handshake = state.config.handshake.clone();

    ws.on_upgrade(move |socket| ws::handle_relay_ws(socket, relay, metrics, handshake))
}
