//! Endpoint addresses
//!
//! `tcp://host:port` and `ipc:///path/to/socket`. A `*` host binds every
//! interface and is rejected for connect.

use crate::{Result, TransportError};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";
const IPC_SCHEME: &str = "ipc://";
const WILDCARD_HOST: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Tcp { host: String, port: u16 },
    Ipc { path: PathBuf },
}

impl Address {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn ipc(path: impl Into<PathBuf>) -> Self {
        Self::Ipc { path: path.into() }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Address::Tcp { .. } => "tcp",
            Address::Ipc { .. } => "ipc",
        }
    }

    /// True for `tcp://*:port`
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Address::Tcp { host, .. } if host == WILDCARD_HOST)
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Address::Tcp { port, .. } => Some(*port),
            Address::Ipc { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Address::Tcp { .. } => None,
            Address::Ipc { path } => Some(path),
        }
    }

    /// `host:port` string handed to the listener
    pub(crate) fn bind_target(&self) -> Result<String> {
        match self {
            Address::Tcp { host, port } if host == WILDCARD_HOST => Ok(format!("0.0.0.0:{port}")),
            Address::Tcp { host, port } => Ok(format!("{host}:{port}")),
            Address::Ipc { .. } => Err(TransportError::invalid_address(
                self.to_string(),
                "ipc address has no host:port target",
            )),
        }
    }

    /// `host:port` string handed to the connector
    pub(crate) fn connect_target(&self) -> Result<String> {
        match self {
            Address::Tcp { host, .. } if host == WILDCARD_HOST => Err(TransportError::invalid_address(
                self.to_string(),
                "wildcard host can only be bound",
            )),
            Address::Tcp { port: 0, .. } => Err(TransportError::invalid_address(
                self.to_string(),
                "port 0 can only be bound",
            )),
            Address::Tcp { host, port } => Ok(format!("{host}:{port}")),
            Address::Ipc { .. } => Err(TransportError::invalid_address(
                self.to_string(),
                "ipc address has no host:port target",
            )),
        }
    }

    /// Check the address is usable as a connect target without resolving it
    pub(crate) fn validate_connect(&self) -> Result<()> {
        match self {
            Address::Tcp { .. } => self.connect_target().map(|_| ()),
            Address::Ipc { .. } => Ok(()),
        }
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix(TCP_SCHEME) {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| TransportError::invalid_address(s, "missing port"))?;
            if host.is_empty() {
                return Err(TransportError::invalid_address(s, "missing host"));
            }
            let port = port
                .parse::<u16>()
                .map_err(|e| TransportError::invalid_address(s, format!("bad port: {e}")))?;
            return Ok(Address::tcp(host, port));
        }

        if let Some(path) = s.strip_prefix(IPC_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::invalid_address(s, "missing socket path"));
            }
            return Ok(Address::ipc(path));
        }

        Err(TransportError::invalid_address(
            s,
            "expected tcp:// or ipc:// scheme",
        ))
    }
}

impl TryFrom<&str> for Address {
    type Error = TransportError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        let host = match addr {
            SocketAddr::V4(v4) => v4.ip().to_string(),
            SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        };
        Address::tcp(host, addr.port())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } => write!(f, "{TCP_SCHEME}{host}:{port}"),
            Address::Ipc { path } => write!(f, "{IPC_SCHEME}{}", path.display()),
        }
    }
}
