//! # Tether Message Types
//!
//! Plain data definitions for every message kind carried on the bus.
//!
//! This crate holds field layouts only. Wire encoding, topic tags and the
//! cached wrapper live in `codec`; transport lives in `network`.
//!
//! ```text
//! libs/types → codec → network → messaging
//!     ↑          ↑         ↑          ↑
//!  Fields    Wire rules  Sockets   Pub/Sub, Req/Rep, Proxy
//! ```

pub mod geometry;
pub mod header;
pub mod messages;

pub use geometry::{Point, Quaternion};
pub use header::Header;
pub use messages::{Capabilities, Position, Status, StatusLevel};
