//! REQ/REP sockets
//!
//! A request travels as `[request id][payload]`; any envelope frames added
//! by a router in between are kept by the replier and echoed back, so the
//! reply retraces the request's path. The requester discards replies whose
//! id does not match its outstanding request.

use crate::endpoint::{Endpoint, InboundPolicy, PeerId, CONNECTED_PEER};
use crate::frame::{id_frame, parse_id_frame, Multipart};
use crate::transports::MetricsSnapshot;
use crate::{Address, Context, Result, TransportError};
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub type RequestId = u64;

pub struct ReqSocket {
    endpoint: Endpoint,
    next_id: RequestId,
    outstanding: Option<RequestId>,
}

impl ReqSocket {
    pub async fn connect(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::connect(ctx, address, InboundPolicy::Block).await?;
        Ok(Self {
            endpoint,
            next_id: 1,
            outstanding: None,
        })
    }

    /// Queue a request, waiting up to `timeout` for room. Abandons any
    /// earlier request still awaiting its reply.
    pub async fn send(&mut self, payload: Bytes, timeout: Duration) -> Result<RequestId> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.outstanding = None;

        let message = Multipart::from(vec![id_frame(id), payload]);
        self.endpoint.send_to(CONNECTED_PEER, message, timeout).await?;
        self.outstanding = Some(id);
        Ok(id)
    }

    /// Wait up to `timeout` for the reply to the outstanding request.
    /// `Ok(None)` means the timeout elapsed; the request is then abandoned.
    pub async fn recv(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let expected = self
            .outstanding
            .ok_or_else(|| TransportError::invalid_state("receive without an outstanding request"))?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(inbound) = self.endpoint.recv_timeout(remaining).await? else {
                self.outstanding = None;
                return Ok(None);
            };

            let mut message = inbound.message;
            if message.len() != 2 {
                warn!(frames = message.len(), "Discarding malformed reply");
                continue;
            }
            let (Some(id), Some(payload)) = (message.pop_front(), message.pop_front()) else {
                continue;
            };
            match parse_id_frame(&id) {
                Some(id) if id == expected => {
                    self.outstanding = None;
                    return Ok(Some(payload));
                }
                other => debug!(?other, expected, "Discarding stale reply"),
            }
        }
    }

    /// Send then wait for the matching reply
    pub async fn request(
        &mut self,
        payload: Bytes,
        send_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<Option<Bytes>> {
        self.send(payload, send_timeout).await?;
        self.recv(recv_timeout).await
    }

    pub fn outstanding(&self) -> Option<RequestId> {
        self.outstanding
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

    pub async fn close(self) {
        self.endpoint.close().await
    }
}

/// A received request awaiting its reply
struct Pending {
    peer: PeerId,
    envelope: Multipart,
}

pub struct RepSocket {
    endpoint: Endpoint,
    pending: Option<Pending>,
}

impl RepSocket {
    /// Bind and serve requesters directly
    pub async fn bind(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::bind(ctx, address, InboundPolicy::Block).await?;
        Ok(Self { endpoint, pending: None })
    }

    /// Connect to a dealer, typically the back side of a proxy
    pub async fn connect(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::connect(ctx, address, InboundPolicy::Block).await?;
        Ok(Self { endpoint, pending: None })
    }

    /// Split a request into its envelope and payload
    fn accept(&mut self, peer: PeerId, mut message: Multipart) -> Option<Bytes> {
        if message.len() < 2 {
            warn!(peer, frames = message.len(), "Discarding request without envelope");
            return None;
        }
        let payload = message.pop_back()?;
        self.pending = Some(Pending {
            peer,
            envelope: message,
        });
        Some(payload)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(TransportError::invalid_state(
                "previous request has not been answered",
            ));
        }
        Ok(())
    }

    /// Wait for the next request
    pub async fn recv(&mut self) -> Result<Bytes> {
        self.ensure_idle()?;
        loop {
            let inbound = self.endpoint.recv().await?;
            if let Some(payload) = self.accept(inbound.peer, inbound.message) {
                return Ok(payload);
            }
        }
    }

    /// Wait up to `timeout` for the next request
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        self.ensure_idle()?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.endpoint.recv_timeout(remaining).await? {
                Some(inbound) => {
                    if let Some(payload) = self.accept(inbound.peer, inbound.message) {
                        return Ok(Some(payload));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// Reply to the pending request. The pending slot is consumed even when
    /// the send fails.
    pub async fn send(&mut self, payload: Bytes, timeout: Duration) -> Result<()> {
        let Pending { peer, mut envelope } = self
            .pending
            .take()
            .ok_or_else(|| TransportError::invalid_state("no pending request to reply to"))?;
        envelope.push_back(payload);
        self.endpoint.send_to(peer, envelope, timeout).await
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending request without replying. Returns false if there
    /// was none.
    pub fn discard_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn local_address(&self) -> &Address {
        self.endpoint.address()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.endpoint.metrics()
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}
