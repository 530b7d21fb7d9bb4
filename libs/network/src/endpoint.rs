//! Endpoint engine
//!
//! An endpoint is either bound (accepts any number of peers) or connected
//! (one peer, reconnected in the background). Each live connection runs a
//! writer loop draining that peer's outbound queue and a reader task feeding
//! the endpoint's shared inbound queue. Both queues are bounded by the
//! context's high-water mark.
//!
//! A connected endpoint keeps its outbound queue across reconnects, so
//! messages sent before the peer is reachable are delivered once it is.

use crate::context::{Registration, Shutdown};
use crate::frame::{read_multipart, write_multipart, Multipart};
use crate::transports::{self, BoxedStream, EndpointMetrics, Listener, MetricsSnapshot};
use crate::{Address, Context, Result, TransportError};
use bytes::BytesMut;
use messaging_config::TransportSettings;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Identifies one connection of an endpoint
pub type PeerId = u64;

/// The single peer of a connected endpoint
pub(crate) const CONNECTED_PEER: PeerId = 0;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Bound,
    Connected,
}

/// What a reader does when the inbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InboundPolicy {
    /// Stop reading until there is room (backpressure onto the peer)
    Block,
    /// Discard the message
    DropWhenFull,
}

#[derive(Debug)]
pub(crate) struct Inbound {
    pub(crate) peer: PeerId,
    pub(crate) message: Multipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Shutdown,
    Disconnected,
}

/// Outbound queues of the currently connected peers
#[derive(Default)]
struct PeerTable {
    peers: RwLock<Vec<(PeerId, mpsc::Sender<Multipart>)>>,
    cursor: AtomicUsize,
    joined: Notify,
}

impl PeerTable {
    fn insert(&self, peer: PeerId, outbound: mpsc::Sender<Multipart>) {
        self.peers.write().push((peer, outbound));
        self.joined.notify_waiters();
    }

    fn remove(&self, peer: PeerId) {
        self.peers.write().retain(|(id, _)| *id != peer);
    }

    fn get(&self, peer: PeerId) -> Option<mpsc::Sender<Multipart>> {
        self.peers
            .read()
            .iter()
            .find(|(id, _)| *id == peer)
            .map(|(_, outbound)| outbound.clone())
    }

    fn snapshot(&self) -> Vec<(PeerId, mpsc::Sender<Multipart>)> {
        self.peers.read().clone()
    }

    /// Next peer in round-robin order
    fn next(&self) -> Option<(PeerId, mpsc::Sender<Multipart>)> {
        let peers = self.peers.read();
        if peers.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % peers.len();
        Some(peers[index].clone())
    }

    fn len(&self) -> usize {
        self.peers.read().len()
    }
}

/// Everything a connection task shares with its endpoint
#[derive(Clone)]
struct Link {
    ctx: Context,
    peers: Arc<PeerTable>,
    inbound: mpsc::Sender<Inbound>,
    policy: InboundPolicy,
    metrics: EndpointMetrics,
    shutdown: Shutdown,
    connected: Arc<AtomicBool>,
    high_water_mark: usize,
    max_message_size: usize,
}

impl Link {
    /// Hand a received message to the endpoint. Returns false once the
    /// endpoint no longer receives.
    async fn deliver(&self, peer: PeerId, message: Multipart) -> bool {
        let inbound = Inbound { peer, message };
        match self.policy {
            InboundPolicy::Block => self.inbound.send(inbound).await.is_ok(),
            InboundPolicy::DropWhenFull => match self.inbound.try_send(inbound) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.metrics.record_drop();
                    debug!(peer, "Inbound queue full, dropping message");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) struct Endpoint {
    role: Role,
    address: Address,
    peers: Arc<PeerTable>,
    inbound: mpsc::Receiver<Inbound>,
    connected: Arc<AtomicBool>,
    metrics: EndpointMetrics,
    max_message_size: usize,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    registration: Registration,
}

impl Endpoint {
    /// Bind a listener and accept peers until closed
    pub(crate) async fn bind(ctx: &Context, address: &Address, policy: InboundPolicy) -> Result<Self> {
        let (link, shutdown_tx, inbound) = Self::prepare(ctx, policy)?;
        let listener = Listener::bind(address).await?;
        let local = listener.local_address().clone();

        info!(address = %local, "Endpoint bound");
        let task = tokio::spawn(accept_loop(listener, link.clone()));
        Ok(Self::assemble(ctx, Role::Bound, local, &link, shutdown_tx, inbound, task))
    }

    /// Connect to a single peer, reconnecting in the background. Returns
    /// immediately; sends queue until the peer is reachable.
    pub(crate) async fn connect(ctx: &Context, address: &Address, policy: InboundPolicy) -> Result<Self> {
        address.validate_connect()?;
        let (link, shutdown_tx, inbound) = Self::prepare(ctx, policy)?;

        let (outbound_tx, outbound_rx) = mpsc::channel(link.high_water_mark);
        link.peers.insert(CONNECTED_PEER, outbound_tx);

        debug!(address = %address, "Endpoint connecting");
        let task = tokio::spawn(connect_loop(
            address.clone(),
            outbound_rx,
            link.clone(),
            ctx.settings().clone(),
        ));
        Ok(Self::assemble(ctx, Role::Connected, address.clone(), &link, shutdown_tx, inbound, task))
    }

    fn prepare(
        ctx: &Context,
        policy: InboundPolicy,
    ) -> Result<(Link, watch::Sender<bool>, mpsc::Receiver<Inbound>)> {
        if ctx.is_terminated() {
            return Err(TransportError::Closed);
        }
        let settings = ctx.settings();
        let (inbound_tx, inbound_rx) = mpsc::channel(settings.high_water_mark.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let link = Link {
            ctx: ctx.clone(),
            peers: Arc::new(PeerTable::default()),
            inbound: inbound_tx,
            policy,
            metrics: EndpointMetrics::new(),
            shutdown: Shutdown::new(shutdown_rx, ctx.terminated()),
            connected: Arc::new(AtomicBool::new(false)),
            high_water_mark: settings.high_water_mark.max(1),
            max_message_size: settings.max_message_size,
        };
        Ok((link, shutdown_tx, inbound_rx))
    }

    fn assemble(
        ctx: &Context,
        role: Role,
        address: Address,
        link: &Link,
        shutdown_tx: watch::Sender<bool>,
        inbound: mpsc::Receiver<Inbound>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            role,
            address,
            peers: link.peers.clone(),
            inbound,
            connected: link.connected.clone(),
            metrics: link.metrics.clone(),
            max_message_size: link.max_message_size,
            shutdown_tx,
            task: Some(task),
            registration: ctx.register_endpoint(),
        }
    }

    /// Resolved local address when bound, remote address when connected
    pub(crate) fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn peer_count(&self) -> usize {
        match self.role {
            Role::Bound => self.peers.len(),
            Role::Connected => usize::from(self.is_connected()),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        match self.role {
            Role::Bound => self.peers.len() > 0,
            Role::Connected => self.connected.load(Ordering::Acquire),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow() || self.registration.context().is_terminated()
    }

    pub(crate) fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    /// Reject a message the receiving side would refuse. An oversized
    /// message on the wire costs the peer its connection.
    fn ensure_fits(&self, message: &Multipart) -> Result<()> {
        let size = message.wire_len();
        if size > self.max_message_size {
            self.metrics.record_drop();
            return Err(TransportError::protocol(format!(
                "Message size {} exceeds maximum {}",
                size, self.max_message_size
            )));
        }
        Ok(())
    }

    /// Queue a message for one peer, waiting up to `timeout` for room
    pub(crate) async fn send_to(&self, peer: PeerId, message: Multipart, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.ensure_fits(&message)?;
        let outbound = self
            .peers
            .get(peer)
            .ok_or_else(|| TransportError::no_peer(format!("send to peer {peer}")))?;
        self.enqueue(peer, &outbound, message, timeout).await
    }

    /// Queue a copy for every peer without waiting. Peers whose queue is
    /// full miss the message. Returns the number of peers reached.
    pub(crate) fn broadcast(&self, message: &Multipart) -> Result<usize> {
        self.ensure_open()?;
        self.ensure_fits(message)?;
        let mut delivered = 0;
        for (peer, outbound) in self.peers.snapshot() {
            match outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.metrics.record_drop();
                    debug!(peer, "Peer queue full, dropping message");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Ok(delivered)
    }

    /// Queue a message for the next peer in round-robin order, waiting up to
    /// `timeout` for a peer to appear and for room in its queue. A peer that
    /// disconnects before taking the message is skipped.
    pub(crate) async fn send_round_robin(&self, mut message: Multipart, timeout: Duration) -> Result<PeerId> {
        self.ensure_open()?;
        self.ensure_fits(&message)?;
        let deadline = Instant::now() + timeout;
        loop {
            // Register before checking so a peer joining in between is seen
            let joined = self.peers.joined.notified();
            if let Some((peer, outbound)) = self.peers.next() {
                match tokio::time::timeout_at(deadline, outbound.send(message)).await {
                    Ok(Ok(())) => return Ok(peer),
                    Ok(Err(_)) if self.role == Role::Connected || self.is_closed() => {
                        return Err(TransportError::connection("Peer disconnected", Some(peer.to_string())));
                    }
                    // Its connection task has already left the table
                    Ok(Err(mpsc::error::SendError(returned))) => {
                        debug!(peer, "Peer gone, trying next");
                        message = returned;
                        continue;
                    }
                    Err(_) => {
                        self.metrics.record_drop();
                        return Err(TransportError::timeout("send", timeout.as_millis() as u64));
                    }
                }
            }
            if tokio::time::timeout_at(deadline, joined).await.is_err() {
                return Err(TransportError::no_peer("round-robin send"));
            }
        }
    }

    /// Resolves once at least one peer is connected. The returned future
    /// does not borrow the endpoint.
    pub(crate) fn peer_joined(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let peers = self.peers.clone();
        async move {
            loop {
                let joined = peers.joined.notified();
                tokio::pin!(joined);
                joined.as_mut().enable();
                if peers.len() > 0 {
                    return;
                }
                joined.await;
            }
        }
    }

    async fn enqueue(
        &self,
        peer: PeerId,
        outbound: &mpsc::Sender<Multipart>,
        message: Multipart,
        timeout: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(timeout, outbound.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::connection("Peer disconnected", Some(peer.to_string()))),
            Err(_) => {
                self.metrics.record_drop();
                Err(TransportError::timeout("send", timeout.as_millis() as u64))
            }
        }
    }

    /// Wait for the next inbound message
    pub(crate) async fn recv(&mut self) -> Result<Inbound> {
        self.ensure_open()?;
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }

    /// Wait up to `timeout` for the next inbound message
    pub(crate) async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Inbound>> {
        self.ensure_open()?;
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(inbound)) => Ok(Some(inbound)),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }

    /// Stop all connection tasks and wait for them to finish
    pub(crate) async fn close(mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(address = %self.address, error = %e, "Endpoint task failed");
                }
            }
        }
        debug!(address = %self.address, "Endpoint closed");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: Listener, link: Link) {
    let mut shutdown = link.shutdown.clone();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_desc)) => {
                    let peer = link.ctx.next_peer_id();
                    let (outbound_tx, mut outbound_rx) = mpsc::channel(link.high_water_mark);
                    link.peers.insert(peer, outbound_tx);
                    link.metrics.record_connection();
                    debug!(peer, remote = %peer_desc, "Accepted connection");

                    let link = link.clone();
                    connections.spawn(async move {
                        let end = drive_connection(stream, peer, &mut outbound_rx, &link).await;
                        link.peers.remove(peer);
                        debug!(peer, remote = %peer_desc, ?end, "Connection finished");
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    link.metrics.record_error();
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
    debug!(address = %listener.local_address(), "Listener stopped");
}

async fn connect_loop(
    address: Address,
    mut outbound: mpsc::Receiver<Multipart>,
    link: Link,
    settings: TransportSettings,
) {
    let mut shutdown = link.shutdown.clone();
    let mut delay = settings.reconnect_interval();

    loop {
        let attempt = tokio::select! {
            _ = shutdown.wait() => break,
            attempt = transports::connect(&address, settings.connect_timeout()) => attempt,
        };

        match attempt {
            Ok((stream, peer_desc)) => {
                info!(address = %address, remote = %peer_desc, "Connected");
                link.metrics.record_connection();
                link.connected.store(true, Ordering::Release);
                let end = drive_connection(stream, CONNECTED_PEER, &mut outbound, &link).await;
                link.connected.store(false, Ordering::Release);

                if end == ConnectionEnd::Shutdown {
                    break;
                }
                info!(address = %address, "Connection lost, reconnecting");
                delay = settings.reconnect_interval();
            }
            Err(e) => {
                debug!(
                    address = %address,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Connect attempt failed"
                );
            }
        }

        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(settings.reconnect_interval_max());
    }

    debug!(address = %address, "Connector stopped");
}

/// Run one connection until shutdown or disconnect
async fn drive_connection(
    stream: BoxedStream,
    peer: PeerId,
    outbound: &mut mpsc::Receiver<Multipart>,
    link: &Link,
) -> ConnectionEnd {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let reader_link = link.clone();
    let mut reader_task = AbortOnDrop(tokio::spawn(async move {
        loop {
            match read_multipart(&mut reader, reader_link.max_message_size).await {
                Ok(Some(message)) => {
                    reader_link.metrics.record_receive(message.wire_len());
                    if !reader_link.deliver(peer, message).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(peer, error = %e, "Read failed, dropping connection");
                    reader_link.metrics.record_error();
                    break;
                }
            }
        }
    }));

    let mut shutdown = link.shutdown.clone();
    let mut buf = BytesMut::with_capacity(WRITE_BUFFER_CAPACITY);

    // Writes run inline: a write is never interrupted once started
    let end = loop {
        tokio::select! {
            _ = shutdown.wait() => break ConnectionEnd::Shutdown,
            _ = &mut reader_task.0 => break ConnectionEnd::Disconnected,
            next = outbound.recv() => match next {
                Some(message) => match write_multipart(&mut writer, &message, &mut buf).await {
                    Ok(written) => link.metrics.record_send(written),
                    Err(e) => {
                        warn!(peer, error = %e, "Write failed, dropping connection");
                        link.metrics.record_error();
                        link.metrics.record_drop();
                        break ConnectionEnd::Disconnected;
                    }
                },
                None => break ConnectionEnd::Shutdown,
            },
        }
    };

    let _ = writer.shutdown().await;
    end
}
