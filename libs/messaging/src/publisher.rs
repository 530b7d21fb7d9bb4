//! Topic-tagged publisher
//!
//! One publisher carries any number of message kinds over a single bound
//! endpoint. Each message goes out as `[topic tag][payload]` so subscribers
//! can demultiplex by prefix.

use crate::error::{parse_address, MessagingError, Result};
use codec::{Message, Wrapper};
use network::{Address, Context, MetricsSnapshot, PubSocket};
use tracing::{debug, info};

pub struct Publisher {
    socket: PubSocket,
}

impl Publisher {
    /// Bind a publishing endpoint, e.g. `tcp://*:5555`
    pub async fn bind(ctx: &Context, address: &str) -> Result<Self> {
        let parsed = parse_address(address)?;
        let socket = PubSocket::bind(ctx, &parsed)
            .await
            .map_err(|e| MessagingError::bind_failure(address, e))?;
        info!(address = %socket.local_address(), "Publisher bound");
        Ok(Self { socket })
    }

    /// Broadcast one message to every connected subscriber. Returns once the
    /// message is queued; subscribers at their high-water mark miss it.
    pub fn publish<M: Message>(&self, message: &Wrapper<M>) -> Result<()> {
        let frame = message.encode_framed()?;
        let bytes = frame.len();
        let reached = self.socket.send(frame).map_err(MessagingError::send_failure)?;
        debug!(topic = M::TOPIC, bytes, subscribers = reached, "Published message");
        Ok(())
    }

    /// Resolved bound address; the real port when bound to port 0
    pub fn local_address(&self) -> &Address {
        self.socket.local_address()
    }

    pub fn subscriber_count(&self) -> usize {
        self.socket.subscriber_count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.socket.metrics()
    }

    /// Unbind and wait for connection tasks to stop
    pub async fn close(self) {
        self.socket.close().await
    }
}
