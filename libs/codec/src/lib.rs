//! # Tether Codec
//!
//! Wire rules for every message kind on the bus:
//! - The [`Message`] capability set (topic tag, encode, decode)
//! - Deterministic payload encoding (`bincode`, version-prefixed)
//! - Topic framing for the pub/sub channel
//! - [`Wrapper`], the cached thread-safe value type handed to transports
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → network/messaging
//!     ↑           ↓              ↓
//! Plain fields  Payloads     Sockets
//! ```
//!
//! ## Wire Formats
//!
//! - Request/reply: `[version][fields]`
//! - Publish/subscribe: `[topic tag][version][fields]`, with no length field
//!   between tag and payload

pub mod error;
pub mod kinds;
pub mod message;
pub mod wrapper;

pub use error::{CodecError, Result};
pub use kinds::{CapabilitiesMessage, HeaderMessage, PositionMessage, StatusMessage};
pub use message::{decode_payload, encode_payload, frame, has_topic, unframe, Message, WIRE_VERSION};
pub use wrapper::Wrapper;
