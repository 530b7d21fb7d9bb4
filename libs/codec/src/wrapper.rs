//! Cached, thread-safe message wrapper
//!
//! `Wrapper<M>` owns the fields of one message and materializes its payload
//! on demand. The payload is cached until the next mutation; reading and
//! mutating the same instance from several threads is serialized by one
//! mutex per instance, so `encode` never observes a half-applied write.
//!
//! ```text
//!            set / modify / assign_from
//!   fields ───────────────────────────▶ cache = None (dirty)
//!      │
//!      └── encode() ──▶ cache empty? ──yes──▶ encode_payload ──▶ cache = Some(bytes)
//!                            │no
//!                            └──────────────▶ cached bytes (same allocation)
//! ```

use crate::message::{self, Message};
use crate::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;

struct State<M> {
    fields: M,
    encoded: Option<Bytes>,
}

/// A message of kind `M` with a lazily rebuilt payload cache
pub struct Wrapper<M: Message> {
    state: Mutex<State<M>>,
}

impl<M: Message> Wrapper<M> {
    /// Wrap explicit field values
    pub fn new(fields: M) -> Self {
        Self {
            state: Mutex::new(State {
                fields,
                encoded: None,
            }),
        }
    }

    /// Topic tag of this wrapper's kind
    pub fn topic() -> &'static str {
        M::TOPIC
    }

    /// Decode a raw payload (request/reply wire format)
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(Self::new(M::decode_payload(payload)?))
    }

    /// Decode a topic-framed buffer (pub/sub wire format)
    pub fn decode_framed(buffer: &[u8]) -> Result<Self> {
        let payload = message::unframe::<M>(buffer)?;
        Self::decode(payload)
    }

    /// Payload for the current field values
    ///
    /// Repeated calls without an intervening mutation return the same buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut state = self.state.lock();
        if let Some(encoded) = &state.encoded {
            return Ok(encoded.clone());
        }
        let encoded = state.fields.encode_payload()?;
        state.encoded = Some(encoded.clone());
        Ok(encoded)
    }

    /// `[topic tag][payload]` for the current field values
    pub fn encode_framed(&self) -> Result<Bytes> {
        let payload = self.encode()?;
        Ok(message::frame::<M>(&payload))
    }

    /// True when a payload for the current fields is cached
    pub fn is_cached(&self) -> bool {
        self.state.lock().encoded.is_some()
    }

    /// Snapshot of the current fields
    pub fn get(&self) -> M {
        self.state.lock().fields.clone()
    }

    /// Read the fields under the lock
    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.state.lock().fields)
    }

    /// Replace all fields
    pub fn set(&self, fields: M) {
        let mut state = self.state.lock();
        state.fields = fields;
        state.encoded = None;
    }

    /// Mutate fields in place; the change is applied atomically
    pub fn modify<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        let mut state = self.state.lock();
        state.encoded = None;
        f(&mut state.fields)
    }

    /// Copy all fields from `other`, leaving this wrapper's cache dirty
    pub fn assign_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }
        let fields = other.get();
        self.set(fields);
    }

    /// Consume the wrapper, returning its fields
    pub fn into_inner(self) -> M {
        self.state.into_inner().fields
    }
}

impl<M: Message> Clone for Wrapper<M> {
    /// Clones the fields only; the copy starts without a cached payload
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<M: Message> PartialEq for Wrapper<M> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        // Snapshot one side so two locks are never held together
        let theirs = other.get();
        self.with(|mine| *mine == theirs)
    }
}

impl<M: Message> From<M> for Wrapper<M> {
    fn from(fields: M) -> Self {
        Self::new(fields)
    }
}

impl<M: Message + Default> Default for Wrapper<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M: Message + fmt::Debug> fmt::Debug for Wrapper<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Wrapper")
            .field("topic", &M::TOPIC)
            .field("fields", &state.fields)
            .field("cached", &state.encoded.is_some())
            .finish()
    }
}
