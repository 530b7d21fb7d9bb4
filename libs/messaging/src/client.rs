//! Request/reply client
//!
//! One request is outstanding at a time, enforced by `&mut self`. Both
//! halves of a call are bounded: queuing the request by the send timeout,
//! waiting for the reply by the receive timeout. A timed-out call fails
//! without retry and any late reply to it is discarded.

use crate::error::{parse_address, MessagingError, Result};
use codec::{Message, Wrapper};
use messaging_config::{defaults, ClientSettings};
use network::{Address, Context, MetricsSnapshot, ReqSocket};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub send_timeout: Duration,
    pub receive_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(defaults::client::SEND_TIMEOUT_MS),
            receive_timeout: Duration::from_millis(defaults::client::RECEIVE_TIMEOUT_MS),
        }
    }
}

impl From<&ClientSettings> for ClientOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            send_timeout: settings.send_timeout(),
            receive_timeout: settings.receive_timeout(),
        }
    }
}

pub struct Client<M: Message> {
    socket: ReqSocket,
    options: ClientOptions,
    _kind: PhantomData<fn() -> M>,
}

impl<M: Message> Client<M> {
    /// Connect to a server or proxy front with default timeouts
    pub async fn connect(ctx: &Context, address: &str) -> Result<Self> {
        Self::connect_with(ctx, address, ClientOptions::default()).await
    }

    pub async fn connect_with(ctx: &Context, address: &str, options: ClientOptions) -> Result<Self> {
        let parsed = parse_address(address)?;
        let socket = ReqSocket::connect(ctx, &parsed)
            .await
            .map_err(|e| MessagingError::bind_failure(address, e))?;
        info!(
            address = %parsed,
            topic = M::TOPIC,
            send_timeout_ms = options.send_timeout.as_millis() as u64,
            receive_timeout_ms = options.receive_timeout.as_millis() as u64,
            "Client connecting"
        );
        Ok(Self {
            socket,
            options,
            _kind: PhantomData,
        })
    }

    /// Send `request` and wait for the server's reply of the same kind
    pub async fn request(&mut self, request: &Wrapper<M>) -> Result<Wrapper<M>> {
        let payload = request.encode()?;
        let bytes = payload.len();

        let id = self
            .socket
            .send(payload, self.options.send_timeout)
            .await
            .map_err(MessagingError::send_failure)?;
        debug!(topic = M::TOPIC, request_id = id, bytes, "Request sent");

        match self
            .socket
            .recv(self.options.receive_timeout)
            .await
            .map_err(MessagingError::receive_failure)?
        {
            Some(reply) => Ok(Wrapper::decode(&reply)?),
            None => {
                let timeout_ms = self.options.receive_timeout.as_millis() as u64;
                warn!(topic = M::TOPIC, request_id = id, timeout_ms, "No reply before timeout");
                Err(MessagingError::RequestTimeout { timeout_ms })
            }
        }
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn remote_address(&self) -> &Address {
        self.socket.remote_address()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.socket.metrics()
    }

    pub async fn close(self) {
        self.socket.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging_config::BusConfig;

    #[test]
    fn test_default_timeouts() {
        let options = ClientOptions::default();
        assert_eq!(options.send_timeout, Duration::from_millis(600));
        assert_eq!(options.receive_timeout, Duration::from_millis(4000));
    }

    #[test]
    fn test_options_from_settings() {
        let config = BusConfig::from_toml_str("[client]\nreceive_timeout_ms = 250\n").unwrap();
        let options = ClientOptions::from(&config.client);
        assert_eq!(options.send_timeout, Duration::from_millis(600));
        assert_eq!(options.receive_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_address() {
        let ctx = Context::new();
        let result = Client::<types::Status>::connect(&ctx, "localhost:5555").await;
        assert!(matches!(result, Err(MessagingError::TransportBindFailure { .. })));
    }
}
