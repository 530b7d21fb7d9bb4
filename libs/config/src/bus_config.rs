//! Bus Configuration Module
//!
//! Loads endpoint settings from TOML files with environment overrides.
//! Every field has a default, so a partial file (or none) is valid.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BusConfig {
    pub transport: TransportSettings,
    pub client: ClientSettings,
    pub server: ServerSettings,
    pub subscriber: SubscriberSettings,
    pub proxy: ProxySettings,
}

/// Socket-level settings shared by every endpoint of a context
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub high_water_mark: usize,
    pub max_message_size: usize,
    pub connect_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub reconnect_interval_max_ms: u64,
}

/// Request/reply client timeouts
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub send_timeout_ms: u64,
    pub receive_timeout_ms: u64,
}

/// Request/reply server settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub poll_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

/// Subscriber settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SubscriberSettings {
    pub receive_timeout_ms: u64,
}

/// Proxy endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProxySettings {
    pub front: String,
    pub back: String,
    pub forward_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            high_water_mark: defaults::transport::HIGH_WATER_MARK,
            max_message_size: defaults::transport::MAX_MESSAGE_SIZE,
            connect_timeout_ms: defaults::transport::CONNECT_TIMEOUT_MS,
            reconnect_interval_ms: defaults::transport::RECONNECT_INTERVAL_MS,
            reconnect_interval_max_ms: defaults::transport::RECONNECT_INTERVAL_MAX_MS,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            send_timeout_ms: defaults::client::SEND_TIMEOUT_MS,
            receive_timeout_ms: defaults::client::RECEIVE_TIMEOUT_MS,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: defaults::server::POLL_TIMEOUT_MS,
            send_timeout_ms: defaults::server::SEND_TIMEOUT_MS,
        }
    }
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            receive_timeout_ms: defaults::subscriber::RECEIVE_TIMEOUT_MS,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            front: defaults::proxy::FRONT_ADDRESS.to_string(),
            back: defaults::proxy::BACK_ADDRESS.to_string(),
            forward_timeout_ms: defaults::proxy::FORWARD_TIMEOUT_MS,
        }
    }
}

impl TransportSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn reconnect_interval_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_max_ms)
    }
}

impl ClientSettings {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl ServerSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl SubscriberSettings {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl ProxySettings {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

impl BusConfig {
    /// Environment variable prefix, e.g. `BUS_CLIENT__RECEIVE_TIMEOUT_MS=8000`
    pub const ENV_PREFIX: &'static str = "BUS";

    /// Load defaults, then the optional file, then `BUS_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading bus configuration: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: BusConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(?config, "Bus configuration loaded");
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BusConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Reject settings no endpoint can work with
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.high_water_mark == 0 {
            bail!("transport.high_water_mark must be greater than zero");
        }
        if t.max_message_size < 16 {
            bail!("transport.max_message_size must be at least 16 bytes");
        }
        if t.reconnect_interval_ms == 0 || t.reconnect_interval_max_ms < t.reconnect_interval_ms {
            bail!("transport reconnect interval must be non-zero and not exceed its maximum");
        }
        if self.client.send_timeout_ms == 0 || self.client.receive_timeout_ms == 0 {
            bail!("client timeouts must be greater than zero");
        }
        if self.server.send_timeout_ms == 0 {
            bail!("server.send_timeout_ms must be greater than zero");
        }
        if self.subscriber.receive_timeout_ms == 0 {
            bail!("subscriber.receive_timeout_ms must be greater than zero");
        }
        if self.proxy.front.is_empty() || self.proxy.back.is_empty() {
            bail!("proxy front and back addresses are required");
        }
        Ok(())
    }
}
