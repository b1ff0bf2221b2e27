//! Shared Relay State
//!
//! The peer map (connection id → outbound channel) and the client registry,
//! owned by the server and handed to handlers by reference. There is no
//! module-level singleton; lifecycle is tied to server start/stop.

use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use super::protocol::ServerFrame;
use crate::registry::{ClientRegistry, UNKNOWN_CLIENT};

/// Outbound frames buffered per connection before fan-out starts dropping.
pub const OUTBOUND_BUFFER: usize = 100;

/// Result of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct RelayState {
    peers: RwLock<HashMap<String, mpsc::Sender<ServerFrame>>>,
    pub registry: ClientRegistry,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection: track its outbound channel and seed the registry
    /// with the sentinel name.
    pub async fn admit(&self, connection_id: &str, tx: mpsc::Sender<ServerFrame>) {
        self.peers
            .write()
            .await
            .insert(connection_id.to_string(), tx);
        self.registry.register(connection_id, UNKNOWN_CLIENT).await;
    }

    /// Drop the outbound channel and the registry entry. Safe to call more
    /// than once.
    pub async fn teardown(&self, connection_id: &str) {
        self.peers.write().await.remove(connection_id);
        self.registry.remove(connection_id).await;
    }

    /// Enqueue `frame` to every peer except `sender_id`. Non-blocking: a
    /// peer that is gone or backpressured is skipped, not retried.
    pub async fn broadcast_except(&self, sender_id: &str, frame: ServerFrame) -> BroadcastOutcome {
        let peers = self.peers.read().await;
        let mut outcome = BroadcastOutcome::default();
        for (id, tx) in peers.iter() {
            if id == sender_id {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.dropped += 1;
                    debug!(peer = %id, "dropping relay delivery: {}", e);
                }
            }
        }
        outcome
    }

    pub async fn connection_count(&self) -> usize {
        self.peers.read().await.len()
    }
}
