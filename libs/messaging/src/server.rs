//! Request/reply server
//!
//! A server holds at most one pending request. Polling or waiting fills
//! the slot, [`Server::reply`] empties it. The server binds to serve clients
//! directly or connects to the back side of a proxy.

use crate::error::{parse_address, MessagingError, Result};
use codec::{Message, Wrapper};
use messaging_config::{defaults, ServerSettings};
use network::{Address, Context, MetricsSnapshot, RepSocket};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Wait per `received_request` poll
    pub poll_timeout: Duration,
    /// Bound on queuing a reply
    pub send_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(defaults::server::POLL_TIMEOUT_MS),
            send_timeout: Duration::from_millis(defaults::server::SEND_TIMEOUT_MS),
        }
    }
}

impl From<&ServerSettings> for ServerOptions {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            poll_timeout: settings.poll_timeout(),
            send_timeout: settings.send_timeout(),
        }
    }
}

pub struct Server<M: Message> {
    socket: RepSocket,
    options: ServerOptions,
    pending: Option<Wrapper<M>>,
    _kind: PhantomData<fn() -> M>,
}

impl<M: Message> Server<M> {
    /// Bind and serve clients directly, e.g. `tcp://*:5556`
    pub async fn bind(ctx: &Context, address: &str) -> Result<Self> {
        Self::bind_with(ctx, address, ServerOptions::default()).await
    }

    pub async fn bind_with(ctx: &Context, address: &str, options: ServerOptions) -> Result<Self> {
        let parsed = parse_address(address)?;
        let socket = RepSocket::bind(ctx, &parsed)
            .await
            .map_err(|e| MessagingError::bind_failure(address, e))?;
        info!(address = %socket.local_address(), topic = M::TOPIC, "Server bound");
        Ok(Self::with_socket(socket, options))
    }

    /// Connect to a proxy's back address
    pub async fn connect(ctx: &Context, address: &str) -> Result<Self> {
        Self::connect_with(ctx, address, ServerOptions::default()).await
    }

    pub async fn connect_with(ctx: &Context, address: &str, options: ServerOptions) -> Result<Self> {
        let parsed = parse_address(address)?;
        let socket = RepSocket::connect(ctx, &parsed)
            .await
            .map_err(|e| MessagingError::bind_failure(address, e))?;
        info!(address = %parsed, topic = M::TOPIC, "Server connecting");
        Ok(Self::with_socket(socket, options))
    }

    fn with_socket(socket: RepSocket, options: ServerOptions) -> Self {
        Self {
            socket,
            options,
            pending: None,
            _kind: PhantomData,
        }
    }

    /// Poll briefly for a request. `true` when one is pending, either just
    /// received or still unanswered; [`Server::request`] then exposes it.
    pub async fn received_request(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self
            .socket
            .recv_timeout(self.options.poll_timeout)
            .await
            .map_err(MessagingError::receive_failure)?
        {
            Some(payload) => self.accept(&payload).map(|()| true),
            None => Ok(false),
        }
    }

    /// Wait for a request without a time bound
    pub async fn next_request(&mut self) -> Result<&Wrapper<M>> {
        if self.pending.is_none() {
            let payload = self.socket.recv().await.map_err(MessagingError::receive_failure)?;
            self.accept(&payload)?;
        }
        self.pending.as_ref().ok_or(MessagingError::NoPendingRequest)
    }

    fn accept(&mut self, payload: &[u8]) -> Result<()> {
        match Wrapper::decode(payload) {
            Ok(request) => {
                debug!(topic = M::TOPIC, bytes = payload.len(), "Request received");
                self.pending = Some(request);
                Ok(())
            }
            Err(e) => {
                // Nothing useful can be sent back; free the socket for the next request
                self.socket.discard_pending();
                warn!(topic = M::TOPIC, error = %e, "Discarding malformed request");
                Err(MessagingError::MalformedMessage(e))
            }
        }
    }

    /// The pending request, if any
    pub fn request(&self) -> Option<&Wrapper<M>> {
        self.pending.as_ref()
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.is_some()
    }

    /// Answer the pending request. Fails with `NoPendingRequest` when there
    /// is none, including a second reply to the same request.
    pub async fn reply(&mut self, reply: &Wrapper<M>) -> Result<()> {
        if self.pending.is_none() {
            return Err(MessagingError::NoPendingRequest);
        }
        let payload = reply.encode()?;
        let bytes = payload.len();
        self.pending = None;

        self.socket
            .send(payload, self.options.send_timeout)
            .await
            .map_err(MessagingError::send_failure)?;
        debug!(topic = M::TOPIC, bytes, "Reply sent");
        Ok(())
    }

    pub fn options(&self) -> ServerOptions {
        self.options
    }

    /// Bound address when bound, proxy address when connected
    pub fn address(&self) -> &Address {
        self.socket.local_address()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.socket.metrics()
    }

    pub async fn close(self) {
        self.socket.close().await
    }
}
