//! PUB/SUB sockets
//!
//! A publisher binds and copies each message to every connected subscriber
//! without waiting. A subscriber connects, filters on frame prefix and
//! receives single-frame messages.

use crate::endpoint::{Endpoint, InboundPolicy};
use crate::frame::Multipart;
use crate::transports::MetricsSnapshot;
use crate::{Address, Context, Result};
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub struct PubSocket {
    endpoint: Endpoint,
}

impl PubSocket {
    pub async fn bind(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::bind(ctx, address, InboundPolicy::DropWhenFull).await?;
        Ok(Self { endpoint })
    }

    /// Queue `frame` for every connected subscriber. Never waits; a
    /// subscriber whose queue is at the high-water mark misses the message.
    /// Returns how many subscribers it was queued for.
    pub fn send(&self, frame: Bytes) -> Result<usize> {
        self.endpoint.broadcast(&Multipart::single(frame))
    }

    pub fn local_address(&self) -> &Address {
        self.endpoint.address()
    }

    pub fn subscriber_count(&self) -> usize {
        self.endpoint.peer_count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.endpoint.metrics()
    }

    pub fn is_closed(&self) -> bool {
        self.endpoint.is_closed()
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}

pub struct SubSocket {
    endpoint: Endpoint,
    prefixes: Vec<Bytes>,
}

impl SubSocket {
    /// Connect to a publisher. With no prefixes registered every message is
    /// accepted.
    pub async fn connect(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::connect(ctx, address, InboundPolicy::DropWhenFull).await?;
        Ok(Self {
            endpoint,
            prefixes: Vec::new(),
        })
    }

    /// Accept messages starting with `prefix`. An empty prefix accepts all.
    pub fn subscribe(&mut self, prefix: impl Into<Bytes>) {
        let prefix = prefix.into();
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    /// Remove a prefix. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, prefix: &[u8]) -> bool {
        let before = self.prefixes.len();
        self.prefixes.retain(|p| p.as_ref() != prefix);
        self.prefixes.len() != before
    }

    pub fn prefixes(&self) -> &[Bytes] {
        &self.prefixes
    }

    fn accepts(&self, frame: &[u8]) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| frame.starts_with(p))
    }

    /// Filter one inbound message down to an accepted frame
    fn admit(&self, mut message: Multipart) -> Option<Bytes> {
        if message.len() != 1 {
            debug!(frames = message.len(), "Ignoring multi-frame publication");
            return None;
        }
        message.pop_front().filter(|frame| self.accepts(frame))
    }

    /// Wait for the next accepted message
    pub async fn recv(&mut self) -> Result<Bytes> {
        loop {
            let inbound = self.endpoint.recv().await?;
            if let Some(frame) = self.admit(inbound.message) {
                return Ok(frame);
            }
        }
    }

    /// Wait up to `timeout` for the next accepted message
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.endpoint.recv_timeout(remaining).await? {
                Some(inbound) => {
                    if let Some(frame) = self.admit(inbound.message) {
                        return Ok(Some(frame));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    pub fn remote_address(&self) -> &Address {
        self.endpoint.address()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_connected()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.endpoint.metrics()
    }

    pub fn is_closed(&self) -> bool {
        self.endpoint.is_closed()
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}
