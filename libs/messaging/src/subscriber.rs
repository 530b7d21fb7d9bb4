//! Typed subscriber
//!
//! Pull mode: [`Subscriber::subscribe`] waits for and decodes one message.
//! Push mode: [`Subscriber::spawn`] moves the subscriber into a background
//! task that decodes each arrival and hands it to a channel
//! ([`Subscription`]) or a callback ([`Subscriber::spawn_with`]).
//!
//! Decode failures are reported as `MalformedMessage` values and never stop
//! the background loop. Stopping is cooperative: the loop observes the stop
//! flag between messages and at least once per receive timeout, and the
//! handle aborts the task when dropped.

use crate::error::{parse_address, MessagingError, Result};
use bytes::Bytes;
use codec::{Message, Wrapper};
use messaging_config::{defaults, SubscriberSettings};
use network::{Address, Context, MetricsSnapshot, SubSocket};
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberOptions {
    /// Wait per receive in the background loop; bounds stop latency
    pub receive_timeout: Duration,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(defaults::subscriber::RECEIVE_TIMEOUT_MS),
        }
    }
}

impl From<&SubscriberSettings> for SubscriberOptions {
    fn from(settings: &SubscriberSettings) -> Self {
        Self {
            receive_timeout: settings.receive_timeout(),
        }
    }
}

pub struct Subscriber<M: Message> {
    socket: SubSocket,
    options: SubscriberOptions,
    _kind: PhantomData<fn() -> M>,
}

impl<M: Message> Subscriber<M> {
    /// Connect to a publisher, e.g. `tcp://localhost:5555`. The connection
    /// is established in the background and re-established if lost.
    pub async fn connect(ctx: &Context, address: &str) -> Result<Self> {
        Self::connect_with(ctx, address, SubscriberOptions::default()).await
    }

    pub async fn connect_with(ctx: &Context, address: &str, options: SubscriberOptions) -> Result<Self> {
        let parsed = parse_address(address)?;
        let socket = SubSocket::connect(ctx, &parsed)
            .await
            .map_err(|e| MessagingError::bind_failure(address, e))?;
        info!(address = %parsed, topic = M::TOPIC, "Subscriber connecting");
        Ok(Self {
            socket,
            options,
            _kind: PhantomData,
        })
    }

    /// Only accept messages whose topic tag starts with `prefix`. May be
    /// called repeatedly to accept several prefixes.
    pub fn with_filter(mut self, prefix: impl Into<Bytes>) -> Self {
        self.socket.subscribe(prefix);
        self
    }

    /// Only accept messages of this subscriber's own kind
    pub fn only_own_topic(self) -> Self {
        self.with_filter(Bytes::from_static(M::TOPIC.as_bytes()))
    }

    /// Wait for the next message and decode it
    pub async fn subscribe(&mut self) -> Result<Wrapper<M>> {
        let frame = self.socket.recv().await.map_err(MessagingError::receive_failure)?;
        Self::decode(&frame)
    }

    /// Wait up to `timeout` for the next message. `Ok(None)` when none came.
    pub async fn subscribe_timeout(&mut self, timeout: Duration) -> Result<Option<Wrapper<M>>> {
        match self
            .socket
            .recv_timeout(timeout)
            .await
            .map_err(MessagingError::receive_failure)?
        {
            Some(frame) => Self::decode(&frame).map(Some),
            None => Ok(None),
        }
    }

    fn decode(frame: &[u8]) -> Result<Wrapper<M>> {
        Wrapper::decode_framed(frame).map_err(|e| {
            warn!(topic = M::TOPIC, error = %e, bytes = frame.len(), "Failed to decode published message");
            MessagingError::MalformedMessage(e)
        })
    }

    pub fn remote_address(&self) -> &Address {
        self.socket.remote_address()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    pub fn options(&self) -> SubscriberOptions {
        self.options
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.socket.metrics()
    }

    pub async fn close(self) {
        self.socket.close().await
    }

    /// Run in a background task delivering every message to the returned
    /// [`Subscription`]
    pub fn spawn(self) -> Subscription<M> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = self.spawn_loop(move |received| sender.send(received).is_ok());
        Subscription { receiver, handle }
    }

    /// Run in a background task invoking `callback` for every message
    pub fn spawn_with<F>(self, mut callback: F) -> SubscriptionHandle
    where
        F: FnMut(Result<Wrapper<M>>) + Send + 'static,
    {
        self.spawn_loop(move |received| {
            callback(received);
            true
        })
    }

    fn spawn_loop<F>(self, deliver: F) -> SubscriptionHandle
    where
        F: FnMut(Result<Wrapper<M>>) -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx, deliver));
        SubscriptionHandle {
            stop: stop_tx,
            task: Some(task),
        }
    }

    async fn run<F>(mut self, mut stop: watch::Receiver<bool>, mut deliver: F)
    where
        F: FnMut(Result<Wrapper<M>>) -> bool,
    {
        let timeout = self.options.receive_timeout;
        debug!(topic = M::TOPIC, "Subscription loop started");

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.subscribe_timeout(timeout) => match received {
                    Ok(Some(message)) => {
                        if !deliver(Ok(message)) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(MessagingError::Closed) => break,
                    Err(e) => {
                        if !deliver(Err(e)) {
                            break;
                        }
                    }
                },
            }
        }

        debug!(topic = M::TOPIC, "Subscription loop stopped");
    }
}

/// Control handle of a background subscriber task
pub struct SubscriptionHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Ask the loop to stop without waiting for it
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Subscription task failed");
                }
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.stop.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Background subscriber delivering decoded messages over a channel
pub struct Subscription<M: Message> {
    receiver: mpsc::UnboundedReceiver<Result<Wrapper<M>>>,
    handle: SubscriptionHandle,
}

impl<M: Message> Subscription<M> {
    /// Next delivered message or decode failure. `None` once the loop has
    /// stopped and everything delivered was consumed.
    pub async fn recv(&mut self) -> Option<Result<Wrapper<M>>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Result<Wrapper<M>>> {
        self.receiver.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for the task to exit
    pub async fn shutdown(self) {
        self.handle.shutdown().await
    }
}
