//! Endpoint Metrics
//!
//! Lock-free counters updated from connection tasks and read as snapshots.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Traffic counters shared by an endpoint and its connection tasks
#[derive(Clone, Default)]
pub struct EndpointMetrics {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    connections: AtomicU64,
    last_activity: RwLock<Option<Instant>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.inner.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.inner.last_activity.write() = Some(Instant::now());
    }

    #[inline]
    pub fn record_receive(&self, bytes: usize) {
        self.inner.messages_received.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.inner.last_activity.write() = Some(Instant::now());
    }

    /// A message discarded at a full queue or a failed write
    #[inline]
    pub fn record_drop(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connection(&self) {
        self.inner.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.inner.messages_sent.load(Ordering::Relaxed),
            messages_received: self.inner.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.inner.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.inner.bytes_received.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            connections: self.inner.connections.load(Ordering::Relaxed),
            last_activity: *self.inner.last_activity.read(),
        }
    }
}

impl std::fmt::Debug for EndpointMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

/// Point-in-time copy of an endpoint's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub dropped: u64,
    pub errors: u64,
    /// Connections accepted or established over the endpoint's lifetime
    pub connections: u64,
    pub last_activity: Option<Instant>,
}
