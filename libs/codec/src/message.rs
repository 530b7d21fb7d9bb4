//! The `Message` capability set: topic tag, encode, decode
//!
//! ```text
//! payload:  [version: u8][bincode(fields)]
//! framed:   [topic tag bytes][payload]
//! ```
//!
//! The payload encoding is fixed-int, little-endian and rejects trailing
//! bytes, so identical field values always produce identical buffers and a
//! buffer decodes only if it is exactly one encoded value.

use crate::{CodecError, Result};
use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Version byte leading every payload
pub const WIRE_VERSION: u8 = 1;

/// A message kind that can travel on the bus
///
/// Implementors only pick a topic tag; encoding is provided through serde.
pub trait Message: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// Short identifier prefixed to pub/sub payloads of this kind
    const TOPIC: &'static str;

    /// Encode the fields into a fresh payload buffer
    fn encode_payload(&self) -> Result<Bytes> {
        encode_payload(self)
    }

    /// Decode a payload produced by [`Message::encode_payload`]
    fn decode_payload(payload: &[u8]) -> Result<Self> {
        decode_payload(payload)
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode `fields` as `[WIRE_VERSION][bincode]`
pub fn encode_payload<M: Message>(fields: &M) -> Result<Bytes> {
    let size = wire_options()
        .serialized_size(fields)
        .map_err(|e| CodecError::encode(M::TOPIC, e))?;

    let mut buf = Vec::with_capacity(1 + size as usize);
    buf.push(WIRE_VERSION);
    wire_options()
        .serialize_into(&mut buf, fields)
        .map_err(|e| CodecError::encode(M::TOPIC, e))?;
    Ok(Bytes::from(buf))
}

/// Decode a `[WIRE_VERSION][bincode]` payload into fields of kind `M`
pub fn decode_payload<M: Message>(payload: &[u8]) -> Result<M> {
    let (&version, body) = payload
        .split_first()
        .ok_or_else(|| CodecError::message_too_small(M::TOPIC, 1, 0))?;

    if version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion {
            kind: M::TOPIC,
            version,
            supported: WIRE_VERSION,
        });
    }

    wire_options()
        .deserialize(body)
        .map_err(|e| CodecError::invalid_payload(M::TOPIC, e))
}

/// Prefix `payload` with the topic tag of kind `M`
pub fn frame<M: Message>(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(M::TOPIC.len() + payload.len());
    buf.put_slice(M::TOPIC.as_bytes());
    buf.put_slice(payload);
    buf.freeze()
}

/// Strip the topic tag of kind `M`, returning the payload behind it
pub fn unframe<M: Message>(buffer: &[u8]) -> Result<&[u8]> {
    buffer
        .strip_prefix(M::TOPIC.as_bytes())
        .ok_or_else(|| CodecError::topic_mismatch(M::TOPIC, buffer))
}

/// True when `buffer` starts with the topic tag of kind `M`
pub fn has_topic<M: Message>(buffer: &[u8]) -> bool {
    buffer.starts_with(M::TOPIC.as_bytes())
}
