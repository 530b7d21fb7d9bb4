//! Codec-level errors for message encoding and decoding
//!
//! Every decode failure is a malformed message: the buffer was not produced
//! by the expected kind's encoder. Encode failures are reported separately.

use thiserror::Error;

/// Encoding and decoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Buffer is too small to contain the expected structure
    #[error("Message too small for {kind}: need {need} bytes, got {got}")]
    MessageTooSmall {
        kind: &'static str,
        need: usize,
        got: usize,
    },

    /// Framed buffer carries another kind's topic tag
    #[error("Topic mismatch: expected {expected}, buffer starts with {got:?}")]
    TopicMismatch { expected: &'static str, got: String },

    /// Payload version byte is not supported
    #[error("Unsupported wire version {version} for {kind}: supported version is {supported}")]
    UnsupportedVersion {
        kind: &'static str,
        version: u8,
        supported: u8,
    },

    /// Payload fields are missing, truncated or followed by trailing bytes
    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    /// Fields could not be serialized
    #[error("Failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
}

impl CodecError {
    pub fn message_too_small(kind: &'static str, need: usize, got: usize) -> Self {
        Self::MessageTooSmall { kind, need, got }
    }

    /// Build a topic mismatch error, previewing at most 16 bytes of the buffer
    pub fn topic_mismatch(expected: &'static str, buffer: &[u8]) -> Self {
        let preview = &buffer[..buffer.len().min(16)];
        Self::TopicMismatch {
            expected,
            got: String::from_utf8_lossy(preview).into_owned(),
        }
    }

    pub fn invalid_payload(kind: &'static str, reason: impl ToString) -> Self {
        Self::InvalidPayload {
            kind,
            reason: reason.to_string(),
        }
    }

    pub fn encode(kind: &'static str, reason: impl ToString) -> Self {
        Self::Encode {
            kind,
            reason: reason.to_string(),
        }
    }

    /// True for every decode-side failure
    pub fn is_malformed(&self) -> bool {
        !matches!(self, CodecError::Encode { .. })
    }

    /// Error category for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            CodecError::MessageTooSmall { .. } => "too_small",
            CodecError::TopicMismatch { .. } => "topic_mismatch",
            CodecError::UnsupportedVersion { .. } => "version",
            CodecError::InvalidPayload { .. } => "payload",
            CodecError::Encode { .. } => "encode",
        }
    }
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_mismatch_preview_is_bounded() {
        let err = CodecError::topic_mismatch("POSITION", b"STATUS_WITH_A_VERY_LONG_SUFFIX");
        match &err {
            CodecError::TopicMismatch { expected, got } => {
                assert_eq!(*expected, "POSITION");
                assert_eq!(got.len(), 16);
            }
            _ => panic!("Expected TopicMismatch"),
        }
        assert!(err.is_malformed());
        assert_eq!(err.category(), "topic_mismatch");
    }

    #[test]
    fn test_encode_is_not_malformed() {
        assert!(!CodecError::encode("POSITION", "boom").is_malformed());
    }
}
