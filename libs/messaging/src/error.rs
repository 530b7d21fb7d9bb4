//! Messaging error types

use codec::CodecError;
use network::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    /// Endpoint could not be bound or connected; the component was not created
    #[error("Transport bind failure on {address}: {reason}")]
    TransportBindFailure { address: String, reason: String },

    /// Outgoing message could not be queued
    #[error("Transport send failure: {0}")]
    TransportSendFailure(#[source] TransportError),

    /// Incoming message could not be received
    #[error("Transport receive failure: {0}")]
    TransportReceiveFailure(#[source] TransportError),

    /// No reply arrived within the receive timeout
    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    /// Buffer did not decode as the expected message kind
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] CodecError),

    #[error("No pending request to reply to")]
    NoPendingRequest,

    #[error("Endpoint closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, MessagingError>;

impl MessagingError {
    pub fn bind_failure(address: impl Into<String>, error: TransportError) -> Self {
        if error.is_closed() {
            return Self::Closed;
        }
        Self::TransportBindFailure {
            address: address.into(),
            reason: error.to_string(),
        }
    }

    pub fn send_failure(error: TransportError) -> Self {
        if error.is_closed() {
            Self::Closed
        } else {
            Self::TransportSendFailure(error)
        }
    }

    pub fn receive_failure(error: TransportError) -> Self {
        if error.is_closed() {
            Self::Closed
        } else {
            Self::TransportReceiveFailure(error)
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            MessagingError::RequestTimeout { .. } => true,
            MessagingError::TransportSendFailure(e) | MessagingError::TransportReceiveFailure(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MessagingError::MalformedMessage(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            MessagingError::TransportBindFailure { .. } => "bind",
            MessagingError::TransportSendFailure(_) => "send",
            MessagingError::TransportReceiveFailure(_) => "receive",
            MessagingError::RequestTimeout { .. } => "timeout",
            MessagingError::MalformedMessage(_) => "malformed",
            MessagingError::NoPendingRequest => "state",
            MessagingError::Closed => "closed",
        }
    }
}

/// Parse an address string, reporting failures as construction errors
pub(crate) fn parse_address(address: &str) -> Result<network::Address> {
    address
        .parse()
        .map_err(|e| MessagingError::bind_failure(address, e))
}
