//! Relay Wire Protocol
//!
//! JSON text frames over the WebSocket. Clients send named events with an
//! opaque payload and an optional acknowledgment slot; the server relays
//! events, resolves acks, and reports unparseable input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::registry::UNKNOWN_CLIENT;

/// Event name reserved for identity registration. Never relayed.
pub const REGISTER_EVENT: &str = "register";

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a valid named event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frames are not part of the relay protocol")]
    Binary,
}

/// A named event sent by a client.
///
/// The payload is opaque; the server never inspects it outside the
/// registration path. `ack` is a correlation number the client picks; if
/// present, exactly one `ServerFrame::Ack` echoes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent FROM the server TO a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// An event relayed from another connection, payload verbatim.
    Event { event: String, payload: Value },
    /// Resolution of an acknowledgment slot. Sent at most once per slot.
    Ack { id: u64, data: AckData },
    /// The last inbound frame could not be understood; the connection
    /// stays open.
    Error { message: String },
}

/// Acknowledgment bodies. Only success-shaped results exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AckData {
    /// The sender's identity was recorded.
    #[serde(rename_all = "camelCase")]
    Registered { id: String, client_type: String },
    /// The event was fanned out to every other connection.
    Forwarded { event: String },
}

/// Lenient view of a registration payload. Any other shape deserializes to
/// the default and collapses to the sentinel name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RegisterPayload {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// `clientType` wins over `name`; empty strings count as absent.
    pub fn resolved_name(&self) -> &str {
        for candidate in [&self.client_type, &self.name] {
            if let Some(name) = candidate.as_deref() {
                if !name.is_empty() {
                    return name;
                }
            }
        }
        UNKNOWN_CLIENT
    }
}
