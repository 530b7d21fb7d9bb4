//! TCP Transport
//!
//! Listener and connector for `tcp://` addresses. Accepted and connected
//! streams have TCP_NODELAY set.

use super::BoxedStream;
use crate::{Address, Result, TransportError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

pub(crate) struct TcpAcceptor {
    listener: TcpListener,
    local: Address,
}

impl TcpAcceptor {
    pub(crate) async fn bind(address: &Address) -> Result<Self> {
        let target = address.bind_target()?;
        let listener = TcpListener::bind(&target)
            .await
            .map_err(|e| TransportError::bind(address.to_string(), e))?;

        // Port 0 resolves to the kernel's choice; keep the caller's host form
        let local = match listener.local_addr() {
            Ok(bound) if address.is_wildcard() => Address::tcp("*", bound.port()),
            Ok(bound) => Address::from(bound),
            Err(_) => address.clone(),
        };

        debug!(address = %local, "TCP listener bound");
        Ok(Self { listener, local })
    }

    pub(crate) fn local_address(&self) -> &Address {
        &self.local
    }

    pub(crate) async fn accept(&self) -> std::io::Result<(BoxedStream, String)> {
        let (stream, peer_addr) = self.listener.accept().await?;
        configure(&stream);
        Ok((Box::new(stream), peer_addr.to_string()))
    }
}

pub(crate) async fn connect(address: &Address, timeout: Duration) -> Result<(BoxedStream, String)> {
    let target = address.connect_target()?;

    let stream = tokio::time::timeout(timeout, TcpStream::connect(&target))
        .await
        .map_err(|_| TransportError::timeout("TCP connect", timeout.as_millis() as u64))?
        .map_err(|e| {
            TransportError::connection_with_source("Failed to connect to TCP peer", Some(target.clone()), e)
        })?;

    configure(&stream);
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or(target);
    Ok((Box::new(stream), peer))
}

fn configure(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }
}
