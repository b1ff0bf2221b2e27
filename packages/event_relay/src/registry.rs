//! Client registry: connection identifier → display name.
//!
//! Every admitted connection has exactly one entry, seeded with the sentinel
//! name until the client registers an identity. The map is owned by the
//! server's `RelayState` and lives only for the process lifetime.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Display name for connections that never announced an identity.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Default)]
pub struct ClientRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally create or overwrite the entry for `connection_id`.
    /// Names are not validated.
    pub async fn register(&self, connection_id: &str, name: &str) {
        self.entries
            .write()
            .await
            .insert(connection_id.to_string(), name.to_string());
    }

    /// Stored name, or the sentinel when no entry exists. Absence is a
    /// normal case (a disconnect can race registration), never an error.
    pub async fn lookup(&self, connection_id: &str) -> String {
        self.entries
            .read()
            .await
            .get(connection_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    /// Delete the entry if present; no-op otherwise.
    pub async fn remove(&self, connection_id: &str) {
        self.entries.write().await.remove(connection_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
