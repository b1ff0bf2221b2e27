//! Per-Frame Dispatch
//!
//! One function invoked for every inbound named event: `register` updates
//! the client registry, everything else fans out to all other connections.

use tracing::{debug, info};

use super::protocol::{AckData, ClientFrame, REGISTER_EVENT, RegisterPayload, ServerFrame};
use super::state::RelayState;
use crate::metrics::ServerMetrics;

/// Handle one inbound frame from `connection_id`.
///
/// Always computes the acknowledgment body; the caller replies with it only
/// when the sender supplied an ack slot.
pub async fn dispatch(
    state: &RelayState,
    metrics: &ServerMetrics,
    connection_id: &str,
    frame: &ClientFrame,
) -> AckData {
    metrics.event_received();
    if frame.event == REGISTER_EVENT {
        handle_register(state, metrics, connection_id, frame).await
    } else {
        relay(state, metrics, connection_id, frame).await
    }
}

/// Registration: record the identity, never broadcast.
///
/// A malformed payload degrades to the sentinel name rather than erroring.
async fn handle_register(
    state: &RelayState,
    metrics: &ServerMetrics,
    connection_id: &str,
    frame: &ClientFrame,
) -> AckData {
    let name = RegisterPayload::from_value(&frame.payload)
        .resolved_name()
        .to_string();
    state.registry.register(connection_id, &name).await;
    metrics.registration_recorded();
    info!(id = %connection_id, name = %name, payload = %frame.payload, "client registered");

    AckData::Registered {
        id: connection_id.to_string(),
        client_type: name,
    }
}

/// Generic fan-out: forward the payload verbatim to every other connection.
///
/// The ack resolves as soon as the broadcast is issued; delivery is
/// fire-and-forget, even when there are zero recipients.
async fn relay(
    state: &RelayState,
    metrics: &ServerMetrics,
    connection_id: &str,
    frame: &ClientFrame,
) -> AckData {
    debug!(id = %connection_id, event = %frame.event, payload = %frame.payload, "relaying event");

    let outcome = state
        .broadcast_except(
            connection_id,
            ServerFrame::Event {
                event: frame.event.clone(),
                payload: frame.payload.clone(),
            },
        )
        .await;
    metrics.deliveries(outcome.delivered as u64, outcome.dropped as u64);
    info!(
        id = %connection_id,
        event = %frame.event,
        peers = outcome.delivered,
        "event forwarded"
    );

    AckData::Forwarded {
        event: frame.event.clone(),
    }
}
