//! # Tether Centralized Configuration
//!
//! Configuration surface consumed by the messaging core:
//!
//! - **Client**: send and receive timeouts for request/reply
//! - **Server**: poll interval and reply send timeout
//! - **Subscriber**: receive interval of the background loop
//! - **Transport**: high-water mark, frame limits, reconnect policy
//! - **Proxy**: front and back addresses
//!
//! ## Usage
//!
//! ```rust,no_run
//! use messaging_config::BusConfig;
//!
//! // Defaults, overridden by a TOML file and BUS_* environment variables
//! let config = BusConfig::load(Some("config/bus.toml".as_ref())).unwrap();
//! assert_eq!(config.client.send_timeout_ms, 600);
//! ```

pub mod bus_config;
pub mod defaults;

pub use bus_config::{
    BusConfig, ClientSettings, ProxySettings, ServerSettings, SubscriberSettings,
    TransportSettings,
};
