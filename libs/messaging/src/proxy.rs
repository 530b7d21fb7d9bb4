//! Request/reply proxy
//!
//! Clients connect to the front (ROUTER), servers connect to the back
//! (DEALER). Requests are spread round-robin over connected servers and
//! replies find their way back by the identity frame the front added. The
//! proxy never decodes payloads and keeps no per-request state.
//!
//! ```text
//!   Client ──REQ──▶ [front ROUTER] ──▶ [back DEALER] ──▶ Server (REP)
//!   Client ◀─────── [front ROUTER] ◀── [back DEALER] ◀── Server
//! ```

use crate::error::{parse_address, MessagingError, Result};
use messaging_config::{defaults, ProxySettings};
use network::{Address, Context, DealerSocket, Multipart, RouterSocket};
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct Proxy {
    front: RouterSocket,
    back: DealerSocket,
    forward_timeout: Duration,
}

impl Proxy {
    /// Bind the front and back addresses with the default forward timeout
    pub async fn bind(ctx: &Context, front: &str, back: &str) -> Result<Self> {
        Self::bind_with(
            ctx,
            front,
            back,
            Duration::from_millis(defaults::proxy::FORWARD_TIMEOUT_MS),
        )
        .await
    }

    /// Bind with an explicit bound on handing a message to the other side
    pub async fn bind_with(ctx: &Context, front: &str, back: &str, forward_timeout: Duration) -> Result<Self> {
        let front_address = parse_address(front)?;
        let back_address = parse_address(back)?;

        let front_socket = RouterSocket::bind(ctx, &front_address)
            .await
            .map_err(|e| MessagingError::bind_failure(front, e))?;
        let back_socket = DealerSocket::bind(ctx, &back_address)
            .await
            .map_err(|e| MessagingError::bind_failure(back, e))?;

        info!(
            front = %front_socket.local_address(),
            back = %back_socket.local_address(),
            "Proxy bound"
        );
        Ok(Self {
            front: front_socket,
            back: back_socket,
            forward_timeout,
        })
    }

    pub async fn from_settings(ctx: &Context, settings: &ProxySettings) -> Result<Self> {
        Self::bind_with(ctx, &settings.front, &settings.back, settings.forward_timeout()).await
    }

    /// Resolved address clients connect to
    pub fn front_address(&self) -> &Address {
        self.front.local_address()
    }

    /// Resolved address servers connect to
    pub fn back_address(&self) -> &Address {
        self.back.local_address()
    }

    /// Forward traffic until the endpoints close
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Forward traffic in a background task
    pub fn spawn(self) -> ProxyHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let front = self.front_address().clone();
        let back = self.back_address().clone();
        let task = tokio::spawn(self.run_until(async move {
            let _ = stop_rx.await;
        }));
        ProxyHandle {
            front,
            back,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Forward traffic until `shutdown` resolves or the endpoints close
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut requests: u64 = 0;
        let mut replies: u64 = 0;

        let outcome = loop {
            // Requests stay queued at the front until a server can take them,
            // so replies keep flowing while none is connected
            let servers_ready = self.back.peer_count() > 0;
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = self.back.peer_joined(), if !servers_ready => {
                    debug!("Server available, resuming requests");
                }
                request = self.front.recv(), if servers_ready => match request {
                    Ok(request) => {
                        if self.forward_request(request).await {
                            requests += 1;
                        }
                    }
                    Err(e) if e.is_closed() => break Ok(()),
                    Err(e) => break Err(MessagingError::receive_failure(e)),
                },
                reply = self.back.recv() => match reply {
                    Ok(reply) => {
                        if self.forward_reply(reply).await {
                            replies += 1;
                        }
                    }
                    Err(e) if e.is_closed() => break Ok(()),
                    Err(e) => break Err(MessagingError::receive_failure(e)),
                },
            }
        };

        info!(requests, replies, "Proxy stopped");
        self.front.close().await;
        self.back.close().await;
        outcome
    }

    async fn forward_request(&self, request: Multipart) -> bool {
        match self.back.send(request, self.forward_timeout).await {
            Ok(server) => {
                debug!(server, "Forwarded request");
                true
            }
            Err(e) => {
                warn!(error = %e, "Dropping request, no server took it");
                false
            }
        }
    }

    async fn forward_reply(&self, reply: Multipart) -> bool {
        match self.front.send(reply, self.forward_timeout).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Dropping reply, client unreachable");
                false
            }
        }
    }
}

/// Handle of a proxy running in the background
pub struct ProxyHandle {
    front: Address,
    back: Address,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ProxyHandle {
    pub fn front_address(&self) -> &Address {
        &self.front
    }

    pub fn back_address(&self) -> &Address {
        &self.back
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop forwarding, close both endpoints and wait for the task
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Proxy task failed");
                    Err(MessagingError::Closed)
                }
            },
            None => Ok(()),
        }
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
