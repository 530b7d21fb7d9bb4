//! Unix Domain Socket Transport
//!
//! Local IPC for `ipc://` addresses. A leftover socket file nobody listens
//! on is replaced on bind; a live one makes the bind fail. The socket file
//! is removed when the listener is dropped.

use super::BoxedStream;
use crate::{Address, Result, TransportError};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

pub(crate) struct IpcAcceptor {
    listener: UnixListener,
    path: PathBuf,
    local: Address,
}

impl IpcAcceptor {
    pub(crate) async fn bind(address: &Address) -> Result<Self> {
        let path = address
            .path()
            .ok_or_else(|| TransportError::invalid_address(address.to_string(), "not an ipc address"))?
            .to_path_buf();

        clear_stale_socket(&path).map_err(|e| TransportError::bind(address.to_string(), e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TransportError::bind(address.to_string(), e))?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::bind(address.to_string(), e))?;
        debug!(path = %path.display(), "Unix socket listener bound");

        Ok(Self {
            listener,
            local: address.clone(),
            path,
        })
    }

    pub(crate) fn local_address(&self) -> &Address {
        &self.local
    }

    pub(crate) async fn accept(&self) -> std::io::Result<(BoxedStream, String)> {
        let (stream, _) = self.listener.accept().await?;
        Ok((Box::new(stream), self.path.display().to_string()))
    }
}

impl Drop for IpcAcceptor {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

/// Remove a socket file left behind by a listener that is gone. Fails with
/// `AddrInUse` when something still accepts on it and refuses to touch
/// anything that is not a socket.
fn clear_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        ));
    }
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "socket is in use by a live listener",
        ));
    }

    debug!(path = %path.display(), "Removing stale socket file");
    std::fs::remove_file(path)
}

pub(crate) async fn connect(path: &Path, timeout: Duration) -> Result<(BoxedStream, String)> {
    let peer = path.display().to_string();
    let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
        .await
        .map_err(|_| TransportError::timeout("Unix socket connect", timeout.as_millis() as u64))?
        .map_err(|e| {
            TransportError::connection_with_source("Failed to connect to Unix socket", Some(peer.clone()), e)
        })?;
    Ok((Box::new(stream), peer))
}
