//! Transport Layer
//!
//! Stream listeners and connectors behind endpoint addresses:
//!
//! - **TCP**: `tcp://host:port`, TCP_NODELAY on every stream
//! - **Unix**: `ipc:///path`, socket file owned by the listener
//!
//! Both yield a boxed byte stream so the endpoint engine is transport
//! agnostic.

pub mod metrics;
pub(crate) mod tcp;
#[cfg(unix)]
pub(crate) mod unix;

use crate::{Address, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub use metrics::{EndpointMetrics, MetricsSnapshot};

/// Byte stream carried by one connection
pub(crate) trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

pub(crate) type BoxedStream = Box<dyn Stream>;

/// Listener for a bound endpoint
pub(crate) enum Listener {
    Tcp(tcp::TcpAcceptor),
    #[cfg(unix)]
    Ipc(unix::IpcAcceptor),
}

impl Listener {
    pub(crate) async fn bind(address: &Address) -> Result<Self> {
        match address {
            Address::Tcp { .. } => Ok(Listener::Tcp(tcp::TcpAcceptor::bind(address).await?)),
            #[cfg(unix)]
            Address::Ipc { .. } => Ok(Listener::Ipc(unix::IpcAcceptor::bind(address).await?)),
            #[cfg(not(unix))]
            Address::Ipc { .. } => Err(crate::TransportError::invalid_address(
                address.to_string(),
                "ipc transport requires Unix domain sockets",
            )),
        }
    }

    pub(crate) fn local_address(&self) -> &Address {
        match self {
            Listener::Tcp(acceptor) => acceptor.local_address(),
            #[cfg(unix)]
            Listener::Ipc(acceptor) => acceptor.local_address(),
        }
    }

    /// Accept one connection, returning the stream and a peer description
    pub(crate) async fn accept(&self) -> std::io::Result<(BoxedStream, String)> {
        match self {
            Listener::Tcp(acceptor) => acceptor.accept().await,
            #[cfg(unix)]
            Listener::Ipc(acceptor) => acceptor.accept().await,
        }
    }
}

/// Open one connection to `address` within `timeout`
pub(crate) async fn connect(address: &Address, timeout: Duration) -> Result<(BoxedStream, String)> {
    match address {
        Address::Tcp { .. } => tcp::connect(address, timeout).await,
        #[cfg(unix)]
        Address::Ipc { path } => unix::connect(path, timeout).await,
        #[cfg(not(unix))]
        Address::Ipc { .. } => Err(crate::TransportError::invalid_address(
            address.to_string(),
            "ipc transport requires Unix domain sockets",
        )),
    }
}
