//! Server metrics for observability
//!
//! Counters for connection churn, role activations and relay traffic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::rooms::Delivery;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Role metrics
    pub presenters_started: AtomicU64,
    /// Presenters that got their previous identifiers back
    pub sessions_resumed: AtomicU64,
    pub remotes_joined: AtomicU64,
    pub followers_joined: AtomicU64,

    // Message metrics
    /// Events received from clients
    pub messages_received: AtomicU64,
    /// Events delivered to room members
    pub messages_relayed: AtomicU64,
    /// Events dropped due to full or closed queues
    pub messages_dropped: AtomicU64,

    // Error metrics
    pub encode_failures: AtomicU64,
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

    // Role tracking
    pub fn presenter_started(&self, resumed: bool) {
        self.presenters_started.fetch_add(1, Ordering::Relaxed);
        if resumed {
            self.sessions_resumed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn remote_joined(&self) {
        self.remotes_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn follower_joined(&self) {
        self.followers_joined.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, delivery: Delivery) {
        self.messages_relayed
            .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
        self.messages_dropped
            .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
    }

    // Error tracking
    pub fn encode_failed(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
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
            roles: RoleMetrics {
                presenters: self.presenters_started.load(Ordering::Relaxed),
                resumed: self.sessions_resumed.load(Ordering::Relaxed),
                remotes: self.remotes_joined.load(Ordering::Relaxed),
                followers: self.followers_joined.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                relayed: self.messages_relayed.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                encode: self.encode_failures.load(Ordering::Relaxed),
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub roles: RoleMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMetrics {
    pub presenters: u64,
    pub resumed: u64,
    pub remotes: u64,
    pub followers: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub relayed: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub encode: u64,
    pub websocket: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub sessions: u64,
    pub uptime_secs: u64,
}
