//! # Tether Messaging
//!
//! Typed messaging over the Tether transport:
//!
//! - **Pub/Sub**: [`Publisher`] broadcasts any message kind on one endpoint,
//!   tagged by topic; [`Subscriber`] receives one kind, pulled or pushed
//!   from a background task.
//! - **Request/Reply**: [`Client`] and [`Server`] exchange one kind with
//!   bounded timeouts and no retries.
//! - **Proxy**: [`Proxy`] relays request/reply traffic between clients and
//!   any number of servers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codec::PositionMessage;
//! use messaging::{Context, Publisher, Subscriber};
//! use types::{Header, Point, Position, Quaternion};
//!
//! # async fn demo() -> messaging::Result<()> {
//! let ctx = Context::new();
//! let publisher = Publisher::bind(&ctx, "tcp://*:5555").await?;
//! let mut subscriber = Subscriber::<Position>::connect(&ctx, "tcp://localhost:5555").await?;
//!
//! let position = PositionMessage::new(Position::new(
//!     Header::new(1, "base"),
//!     Point::new(1.0, 1.1, 1.2),
//!     Quaternion::IDENTITY,
//! ));
//! publisher.publish(&position)?;
//! let _received = subscriber.subscribe().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod proxy;
pub mod publisher;
pub mod server;
pub mod subscriber;

pub use client::{Client, ClientOptions};
pub use error::{MessagingError, Result};
pub use proxy::{Proxy, ProxyHandle};
pub use publisher::Publisher;
pub use server::{Server, ServerOptions};
pub use subscriber::{Subscriber, SubscriberOptions, Subscription, SubscriptionHandle};

// Transport types callers need alongside the components
pub use network::{Address, Context, MetricsSnapshot, TransportSettings};
