//! Multipart framing
//!
//! A message is one or more frames. On the wire:
//! `[u32 BE frame count]` then per frame `[u32 BE length][bytes]`.
//! Frame count and total payload size are both bounded by the endpoint's
//! `max_message_size`.

use crate::{Result, TransportError};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const PREFIX_LEN: usize = 4;

/// Ordered frames making up one transport message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    frames: VecDeque<Bytes>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(frame: impl Into<Bytes>) -> Self {
        let mut frames = VecDeque::with_capacity(1);
        frames.push_back(frame.into());
        Self { frames }
    }

    pub fn push_back(&mut self, frame: impl Into<Bytes>) {
        self.frames.push_back(frame.into());
    }

    pub fn push_front(&mut self, frame: impl Into<Bytes>) {
        self.frames.push_front(frame.into());
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    pub fn pop_back(&mut self) -> Option<Bytes> {
        self.frames.pop_back()
    }

    pub fn front(&self) -> Option<&Bytes> {
        self.frames.front()
    }

    pub fn back(&self) -> Option<&Bytes> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.frames.iter()
    }

    /// Sum of frame lengths, excluding prefixes
    pub fn payload_len(&self) -> usize {
        self.frames.iter().map(Bytes::len).sum()
    }

    /// Size of the encoded message on the wire
    pub fn wire_len(&self) -> usize {
        PREFIX_LEN + self.frames.iter().map(|f| PREFIX_LEN + f.len()).sum::<usize>()
    }
}

impl From<Vec<Bytes>> for Multipart {
    fn from(frames: Vec<Bytes>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl From<Bytes> for Multipart {
    fn from(frame: Bytes) -> Self {
        Self::single(frame)
    }
}

impl IntoIterator for Multipart {
    type Item = Bytes;
    type IntoIter = std::collections::vec_deque::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

/// Encode a routing id (peer identity or request id) as an 8-byte frame
pub(crate) fn id_frame(id: u64) -> Bytes {
    Bytes::copy_from_slice(&id.to_be_bytes())
}

pub(crate) fn parse_id_frame(frame: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = frame.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| TransportError::protocol(format!("Length {} does not fit a frame prefix", len)))
}

/// Write one multipart message using `buf` as the staging buffer.
/// Returns the number of bytes put on the wire.
pub(crate) async fn write_multipart<W>(
    writer: &mut W,
    message: &Multipart,
    buf: &mut BytesMut,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    buf.clear();
    buf.reserve(message.wire_len());
    buf.put_u32(prefix(message.len())?);
    for frame in message.iter() {
        buf.put_u32(prefix(frame.len())?);
        buf.put_slice(frame);
    }

    // Single write call per message
    writer
        .write_all(&buf[..])
        .await
        .map_err(|e| TransportError::connection_with_source("Failed to write message", None, e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::connection_with_source("Failed to flush stream", None, e))?;

    Ok(buf.len())
}

/// Read one multipart message. `Ok(None)` means the peer closed the stream
/// cleanly between messages.
pub(crate) async fn read_multipart<R>(reader: &mut R, max_size: usize) -> Result<Option<Multipart>>
where
    R: AsyncRead + Unpin,
{
    let count = match reader.read_u32().await {
        Ok(count) => count as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(TransportError::connection_with_source(
                "Failed to read frame count",
                None,
                e,
            ))
        }
    };

    if count == 0 {
        return Err(TransportError::protocol("Message with zero frames"));
    }
    if count.saturating_mul(PREFIX_LEN) > max_size {
        return Err(TransportError::protocol(format!(
            "Frame count {} exceeds maximum message size {}",
            count, max_size
        )));
    }

    let mut frames = VecDeque::with_capacity(count);
    let mut total = 0usize;
    for _ in 0..count {
        let len = reader
            .read_u32()
            .await
            .map_err(|e| TransportError::connection_with_source("Failed to read frame length", None, e))?
            as usize;

        total = total.saturating_add(len);
        if total > max_size {
            return Err(TransportError::protocol(format!(
                "Message size {} exceeds maximum {}",
                total, max_size
            )));
        }

        let mut frame = BytesMut::zeroed(len);
        reader
            .read_exact(&mut frame)
            .await
            .map_err(|e| TransportError::connection_with_source("Failed to read frame data", None, e))?;
        frames.push_back(frame.freeze());
    }

    Ok(Some(Multipart { frames }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Multipart {
        Multipart::from(vec![
            id_frame(7),
            Bytes::new(),
            Bytes::from_static(b"POSITION payload"),
        ])
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let message = sample();
        let mut wire = Vec::new();
        let mut buf = BytesMut::new();
        let written = write_multipart(&mut wire, &message, &mut buf).await.unwrap();
        assert_eq!(written, message.wire_len());
        assert_eq!(&wire[..4], &3u32.to_be_bytes());

        let mut reader = wire.as_slice();
        let read = read_multipart(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(read, message);
        assert!(read_multipart(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let message = Multipart::single(Bytes::from(vec![0u8; 64]));
        let mut wire = Vec::new();
        write_multipart(&mut wire, &message, &mut BytesMut::new())
            .await
            .unwrap();

        let err = read_multipart(&mut wire.as_slice(), 32).await.unwrap_err();
        assert_eq!(err.category(), "protocol");
    }

    #[tokio::test]
    async fn test_truncated_frame_is_connection_error() {
        let mut wire = Vec::new();
        write_multipart(&mut wire, &sample(), &mut BytesMut::new())
            .await
            .unwrap();
        wire.truncate(wire.len() - 3);

        let err = read_multipart(&mut wire.as_slice(), 1024).await.unwrap_err();
        assert_eq!(err.category(), "connection");
    }

    #[tokio::test]
    async fn test_zero_frames_rejected() {
        let wire = 0u32.to_be_bytes();
        assert!(read_multipart(&mut wire.as_slice(), 1024).await.is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_prefix_rejects_lengths_past_u32() {
        assert_eq!(prefix(u32::MAX as usize).unwrap(), u32::MAX);
        let err = prefix(u32::MAX as usize + 1).unwrap_err();
        assert_eq!(err.category(), "protocol");
    }

    #[test]
    fn test_id_frames() {
        assert_eq!(parse_id_frame(&id_frame(u64::MAX)), Some(u64::MAX));
        assert_eq!(parse_id_frame(b"short"), None);
    }
}
