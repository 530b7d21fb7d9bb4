//! Shared transport context
//!
//! Every endpoint is created from a [`Context`] and holds a clone of it, so
//! the context always outlives its endpoints. [`Context::terminate`] asks
//! every endpoint created from it to stop.

use crate::endpoint::PeerId;
use messaging_config::TransportSettings;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    settings: TransportSettings,
    terminate_tx: watch::Sender<bool>,
    endpoints: AtomicUsize,
    next_peer_id: AtomicU64,
}

impl Context {
    pub fn new() -> Self {
        Self::with_settings(TransportSettings::default())
    }

    pub fn with_settings(settings: TransportSettings) -> Self {
        let (terminate_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                settings,
                terminate_tx,
                endpoints: AtomicUsize::new(0),
                // 0 is reserved for the single peer of a connecting endpoint
                next_peer_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.inner.settings
    }

    /// Stop every endpoint created from this context. Pending and future
    /// operations on them fail with `TransportError::Closed`.
    pub fn terminate(&self) {
        if !self.inner.terminate_tx.send_replace(true) {
            info!(endpoints = self.endpoint_count(), "Terminating transport context");
        }
    }

    pub fn is_terminated(&self) -> bool {
        *self.inner.terminate_tx.borrow()
    }

    /// Number of live endpoints created from this context
    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.load(Ordering::Acquire)
    }

    pub(crate) fn terminated(&self) -> watch::Receiver<bool> {
        self.inner.terminate_tx.subscribe()
    }

    pub(crate) fn next_peer_id(&self) -> PeerId {
        self.inner.next_peer_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_endpoint(&self) -> Registration {
        self.inner.endpoints.fetch_add(1, Ordering::AcqRel);
        Registration { ctx: self.clone() }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("endpoints", &self.endpoint_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Keeps the context alive and counted for the lifetime of an endpoint
pub(crate) struct Registration {
    ctx: Context,
}

impl Registration {
    pub(crate) fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.ctx.inner.endpoints.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Stop signal observed by endpoint tasks: the endpoint's own flag or the
/// context's terminate flag, whichever fires first.
#[derive(Clone)]
pub(crate) struct Shutdown {
    endpoint: watch::Receiver<bool>,
    context: watch::Receiver<bool>,
}

impl Shutdown {
    pub(crate) fn new(endpoint: watch::Receiver<bool>, context: watch::Receiver<bool>) -> Self {
        Self { endpoint, context }
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.endpoint.borrow() || *self.context.borrow()
    }

    /// Resolves once either flag is set or its sender is gone. Cancel safe.
    pub(crate) async fn wait(&mut self) {
        loop {
            if self.is_triggered() {
                return;
            }
            tokio::select! {
                changed = self.endpoint.changed() => if changed.is_err() { return },
                changed = self.context.changed() => if changed.is_err() { return },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_peer_ids_start_after_reserved() {
        let ctx = Context::new();
        assert_eq!(ctx.next_peer_id(), 1);
        assert_eq!(ctx.next_peer_id(), 2);
    }

    #[test]
    fn test_registration_counts_endpoints() {
        let ctx = Context::new();
        let first = ctx.register_endpoint();
        let second = ctx.clone().register_endpoint();
        assert_eq!(ctx.endpoint_count(), 2);
        drop(first);
        assert_eq!(ctx.endpoint_count(), 1);
        drop(second);
        assert_eq!(ctx.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn test_terminate_wakes_shutdown() {
        let ctx = Context::new();
        let (_endpoint_tx, endpoint_rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(endpoint_rx, ctx.terminated());
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move { shutdown.wait().await });
        ctx.terminate();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("shutdown should resolve after terminate")
            .unwrap();
        assert!(ctx.is_terminated());
    }

    #[tokio::test]
    async fn test_dropped_endpoint_sender_wakes_shutdown() {
        let ctx = Context::new();
        let (endpoint_tx, endpoint_rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(endpoint_rx, ctx.terminated());
        drop(endpoint_tx);
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("shutdown should resolve when the endpoint is gone");
    }
}
