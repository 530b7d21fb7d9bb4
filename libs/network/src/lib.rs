//! Network Infrastructure
//!
//! Socket transport for the messaging layer. Endpoints are created from a
//! shared [`Context`], bound or connected to an [`Address`], and speak one of
//! the socket patterns in [`sockets`]. Messages are [`Multipart`] frames over
//! TCP or Unix domain sockets.

pub mod address;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod sockets;
pub mod transports;

// Re-export commonly used types
pub use address::Address;
pub use context::Context;
pub use endpoint::PeerId;
pub use error::{Result, TransportError};
pub use frame::Multipart;
pub use messaging_config::TransportSettings;
pub use sockets::reqrep::RequestId;
pub use sockets::{DealerSocket, PubSocket, RepSocket, ReqSocket, RouterSocket, SubSocket};
pub use transports::{EndpointMetrics, MetricsSnapshot};

#[cfg(test)]
pub(crate) mod testing {
    use crate::Address;
    use std::time::Duration;

    /// Loopback address on a kernel-chosen port
    pub(crate) fn local_tcp() -> Address {
        Address::tcp("127.0.0.1", 0)
    }

    /// Loopback address with nothing listening on it
    pub(crate) async fn silent_tcp() -> Address {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Address::tcp("127.0.0.1", port)
    }

    /// Poll `condition` until it holds, panicking after five seconds
    pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
