//! Transport Error Types
//!
//! Error handling for endpoint binding, connection management, framing and
//! timeouts. Every public socket operation returns these; nothing retries.

use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Address could not be parsed or used for the requested operation
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Listener could not be bound (address in use, permission, bad interface)
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Connection management errors
    #[error("Connection error: {message} (peer: {peer:?})")]
    Connection {
        message: String,
        peer: Option<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Framing errors on the wire
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Transport timeout errors
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// No connected peer can take the message
    #[error("No peer available for {operation}")]
    NoPeer { operation: String },

    /// Operation not allowed in the socket's current state
    #[error("Invalid socket state: {message}")]
    InvalidState { message: String },

    /// Endpoint or its context has shut down
    #[error("Endpoint closed")]
    Closed,

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a bind error
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            address: address.into(),
            source,
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, peer: Option<String>) -> Self {
        Self::Connection {
            message: message.into(),
            peer,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        peer: Option<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            peer,
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a no-peer error
    pub fn no_peer(operation: impl Into<String>) -> Self {
        Self::NoPeer {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }

    /// Check if the same call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connection { .. }
                | TransportError::Timeout { .. }
                | TransportError::NoPeer { .. }
                | TransportError::Io { .. }
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::InvalidAddress { .. } => "address",
            TransportError::Bind { .. } => "bind",
            TransportError::Connection { .. } => "connection",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Timeout { .. } => "timeout",
            TransportError::NoPeer { .. } => "no_peer",
            TransportError::InvalidState { .. } => "state",
            TransportError::Closed => "closed",
            TransportError::Io { .. } => "io",
        }
    }
}

/// Convert standard I/O errors to transport errors
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}
