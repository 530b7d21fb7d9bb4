//! ROUTER/DEALER sockets
//!
//! A router prefixes every received message with an 8-byte identity frame
//! naming the connection it came from, and routes outgoing messages by
//! popping that frame. A dealer spreads outgoing messages round-robin over
//! its peers and passes received messages through unchanged.

use crate::endpoint::{Endpoint, InboundPolicy, PeerId};
use crate::frame::{id_frame, parse_id_frame, Multipart};
use crate::transports::MetricsSnapshot;
use crate::{Address, Context, Result, TransportError};
use std::future::Future;
use std::time::Duration;

pub struct RouterSocket {
    endpoint: Endpoint,
}

impl RouterSocket {
    pub async fn bind(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::bind(ctx, address, InboundPolicy::Block).await?;
        Ok(Self { endpoint })
    }

    fn tag(peer: PeerId, mut message: Multipart) -> Multipart {
        message.push_front(id_frame(peer));
        message
    }

    /// Next message, identity frame first
    pub async fn recv(&mut self) -> Result<Multipart> {
        let inbound = self.endpoint.recv().await?;
        Ok(Self::tag(inbound.peer, inbound.message))
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Multipart>> {
        Ok(self
            .endpoint
            .recv_timeout(timeout)
            .await?
            .map(|inbound| Self::tag(inbound.peer, inbound.message)))
    }

    /// Route a message by its leading identity frame, which is removed
    pub async fn send(&self, mut message: Multipart, timeout: Duration) -> Result<()> {
        let peer = message
            .pop_front()
            .as_deref()
            .and_then(parse_id_frame)
            .ok_or_else(|| TransportError::protocol("Routed message lacks an identity frame"))?;
        self.endpoint.send_to(peer, message, timeout).await
    }

    pub fn local_address(&self) -> &Address {
        self.endpoint.address()
    }

    pub fn peer_count(&self) -> usize {
        self.endpoint.peer_count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.endpoint.metrics()
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}

pub struct DealerSocket {
    endpoint: Endpoint,
}

impl DealerSocket {
    pub async fn bind(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::bind(ctx, address, InboundPolicy::Block).await?;
        Ok(Self { endpoint })
    }

    pub async fn connect(ctx: &Context, address: &Address) -> Result<Self> {
        let endpoint = Endpoint::connect(ctx, address, InboundPolicy::Block).await?;
        Ok(Self { endpoint })
    }

    /// Queue a message for the next peer in turn, waiting up to `timeout`
    /// for a peer and for room in its queue. Returns the chosen peer.
    pub async fn send(&self, message: Multipart, timeout: Duration) -> Result<PeerId> {
        self.endpoint.send_round_robin(message, timeout).await
    }

    pub async fn recv(&mut self) -> Result<Multipart> {
        Ok(self.endpoint.recv().await?.message)
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Multipart>> {
        Ok(self
            .endpoint
            .recv_timeout(timeout)
            .await?
            .map(|inbound| inbound.message))
    }

    pub fn local_address(&self) -> &Address {
        self.endpoint.address()
    }

    pub fn peer_count(&self) -> usize {
        self.endpoint.peer_count()
    }

    /// Resolves once a peer is available to take a message
    pub fn peer_joined(&self) -> impl Future<Output = ()> + Send + 'static {
        self.endpoint.peer_joined()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.endpoint.metrics()
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sockets::{RepSocket, ReqSocket};
    use crate::testing::{local_tcp, wait_until};
    use crate::TransportSettings;
    use bytes::Bytes;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_router_tags_and_routes_by_identity() {
        let ctx = Context::new();
        let mut router = RouterSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let mut first = DealerSocket::connect(&ctx, router.local_address()).await.unwrap();
        let mut second = DealerSocket::connect(&ctx, router.local_address()).await.unwrap();

        first.send(Multipart::single(Bytes::from_static(b"one")), TIMEOUT).await.unwrap();
        let from_first = router.recv_timeout(TIMEOUT).await.unwrap().unwrap();
        second.send(Multipart::single(Bytes::from_static(b"two")), TIMEOUT).await.unwrap();
        let from_second = router.recv_timeout(TIMEOUT).await.unwrap().unwrap();

        assert_eq!(from_first.len(), 2);
        assert_ne!(from_first.front(), from_second.front());

        let mut reply = Multipart::new();
        reply.push_back(from_second.front().unwrap().clone());
        reply.push_back(Bytes::from_static(b"back-to-two"));
        router.send(reply, TIMEOUT).await.unwrap();

        let received = second.recv_timeout(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(received, Multipart::single(Bytes::from_static(b"back-to-two")));
        assert!(first.recv_timeout(Duration::from_millis(100)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_router_rejects_untagged_message() {
        let ctx = Context::new();
        let router = RouterSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let err = router
            .send(Multipart::single(Bytes::from_static(b"no identity")), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "protocol");
    }

    #[tokio::test]
    async fn test_dealer_round_robin() {
        let ctx = Context::new();
        let dealer = DealerSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let mut first = RepSocket::connect(&ctx, dealer.local_address()).await.unwrap();
        let mut second = RepSocket::connect(&ctx, dealer.local_address()).await.unwrap();
        wait_until(|| dealer.peer_count() == 2).await;

        for payload in [b"a", b"b"] {
            let message = Multipart::from(vec![Bytes::from_static(b"envelope"), Bytes::from_static(payload)]);
            dealer.send(message, TIMEOUT).await.unwrap();
        }

        let one = first.recv_timeout(TIMEOUT).await.unwrap().unwrap();
        let two = second.recv_timeout(TIMEOUT).await.unwrap().unwrap();
        assert_ne!(one, two);
    }

    #[tokio::test]
    async fn test_dealer_without_peers_times_out() {
        let ctx = Context::new();
        let dealer = DealerSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let err = dealer
            .send(Multipart::single(Bytes::from_static(b"x")), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "no_peer");
    }

    #[tokio::test]
    async fn test_peer_joined_waits_for_first_peer() {
        let ctx = Context::new();
        let dealer = DealerSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let joined = dealer.peer_joined();
        tokio::pin!(joined);
        assert!(tokio::time::timeout(Duration::from_millis(50), &mut joined).await.is_err());

        let _rep = RepSocket::connect(&ctx, dealer.local_address()).await.unwrap();
        tokio::time::timeout(TIMEOUT, joined).await.expect("peer should join");
        // Already satisfied
        tokio::time::timeout(TIMEOUT, dealer.peer_joined()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dealer_rejects_oversized_message() {
        let settings = TransportSettings {
            max_message_size: 64,
            ..TransportSettings::default()
        };
        let ctx = Context::with_settings(settings);
        let dealer = DealerSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let mut rep = RepSocket::connect(&ctx, dealer.local_address()).await.unwrap();
        wait_until(|| dealer.peer_count() == 1).await;

        let oversized = Multipart::from(vec![Bytes::from_static(b"envelope"), Bytes::from(vec![0u8; 128])]);
        let err = dealer.send(oversized, TIMEOUT).await.unwrap_err();
        assert_eq!(err.category(), "protocol");

        // The connection is untouched and still carries normal traffic
        let message = Multipart::from(vec![Bytes::from_static(b"envelope"), Bytes::from_static(b"ok")]);
        dealer.send(message, TIMEOUT).await.unwrap();
        assert_eq!(rep.recv_timeout(TIMEOUT).await.unwrap().unwrap(), "ok");
        assert_eq!(rep.metrics().errors, 0);
    }

    #[tokio::test]
    async fn test_req_through_router_dealer() {
        let ctx = Context::new();
        let mut router = RouterSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let mut dealer = DealerSocket::bind(&ctx, &local_tcp()).await.unwrap();
        let mut rep = RepSocket::connect(&ctx, dealer.local_address()).await.unwrap();
        let mut req = ReqSocket::connect(&ctx, router.local_address()).await.unwrap();

        let relay = tokio::spawn(async move {
            let request = router.recv().await.unwrap();
            dealer.send(request, TIMEOUT).await.unwrap();
            let reply = dealer.recv().await.unwrap();
            router.send(reply, TIMEOUT).await.unwrap();
        });
        let server = tokio::spawn(async move {
            let request = rep.recv().await.unwrap();
            rep.send(request, TIMEOUT).await.unwrap();
        });

        let reply = req
            .request(Bytes::from_static(b"echo"), TIMEOUT, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(reply.unwrap(), "echo");
        relay.await.unwrap();
        server.await.unwrap();
    }
}
