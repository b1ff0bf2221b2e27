//! Server metrics for observability
//!
//! Runtime counters for monitoring the relay: connection churn, fan-out
//! volume, and error rates.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Relay metrics
    /// Named events received from clients
    pub events_received: AtomicU64,
    /// Fan-out deliveries enqueued to peers
    pub events_relayed: AtomicU64,
    /// Deliveries skipped because a peer was gone or backpressured
    pub events_dropped: AtomicU64,
    /// Identity registrations recorded
    pub registrations: AtomicU64,
    /// Acknowledgment frames sent back to senders
    pub acks_sent: AtomicU64,

    // Error metrics
    /// Inbound frames that failed to parse
    pub frame_errors: AtomicU64,
    /// Transport-level WebSocket errors
    pub websocket_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Relay tracking
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one fan-out pass: how many peers got the event enqueued and
    /// how many were skipped.
    pub fn deliveries(&self, enqueued: u64, dropped: u64) {
        self.events_relayed.fetch_add(enqueued, Ordering::Relaxed);
        self.events_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn registration_recorded(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ack_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            relay: RelayMetrics {
                events_received: self.events_received.load(Ordering::Relaxed),
                events_relayed: self.events_relayed.load(Ordering::Relaxed),
                events_dropped: self.events_dropped.load(Ordering::Relaxed),
                registrations: self.registrations.load(Ordering::Relaxed),
                acks_sent: self.acks_sent.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                frame: self.frame_errors.load(Ordering::Relaxed),
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time view of all metrics (for /metrics and logging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub relay: RelayMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMetrics {
    pub events_received: u64,
    pub events_relayed: u64,
    pub events_dropped: u64,
    pub registrations: u64,
    pub acks_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub frame: u64,
    pub websocket: u64,
}

/// Health check response shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub registered_clients: u64,
    pub uptime_secs: u64,
}
