//! Default values shared by every endpoint

/// Request/reply client defaults
pub mod client {
    /// Bound on queuing an outgoing request (milliseconds)
    pub const SEND_TIMEOUT_MS: u64 = 600;

    /// Bound on waiting for a reply (milliseconds)
    pub const RECEIVE_TIMEOUT_MS: u64 = 4_000;
}

/// Request/reply server defaults
pub mod server {
    /// Poll interval of `received_request` (milliseconds)
    pub const POLL_TIMEOUT_MS: u64 = 10;

    /// Bound on queuing a reply (milliseconds)
    pub const SEND_TIMEOUT_MS: u64 = 600;
}

/// Subscriber defaults
pub mod subscriber {
    /// Receive timeout of the background loop; bounds shutdown latency (milliseconds)
    pub const RECEIVE_TIMEOUT_MS: u64 = 1_000;
}

/// Transport defaults
pub mod transport {
    /// Messages queued per peer before sends block or drop
    pub const HIGH_WATER_MARK: usize = 1_000;

    /// Largest accepted multipart message (bytes)
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

    /// Per-attempt connect timeout (milliseconds)
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// First reconnect delay (milliseconds)
    pub const RECONNECT_INTERVAL_MS: u64 = 100;

    /// Reconnect delay cap (milliseconds)
    pub const RECONNECT_INTERVAL_MAX_MS: u64 = 5_000;
}

/// Proxy defaults
pub mod proxy {
    pub const FRONT_ADDRESS: &str = "tcp://*:5559";
    pub const BACK_ADDRESS: &str = "tcp://*:5560";

    /// Bound on handing a message to the other side (milliseconds)
    pub const FORWARD_TIMEOUT_MS: u64 = 1_000;
}
