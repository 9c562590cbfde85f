//! Unix Domain Socket endpoint handling.
//!
//! - Listener creation with an explicit accept backlog
//! - Stale socket file removal before bind
//! - Socket file cleanup on drop
//!
//! # Example
//!
//! ```ignore
//! use unix_mailbox::transport::EndpointListener;
//!
//! let listener = EndpointListener::bind("/tmp/mailbox.sock", 30)?;
//! let stream = listener.accept()?;
//! ```

use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use nix::sys::socket::{self, AddressFamily, Backlog, SockFlag, SockType, UnixAddr};

use crate::error::{BindStage, MailboxError, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SOCKET_FLAGS: SockFlag = SockFlag::SOCK_CLOEXEC;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SOCKET_FLAGS: SockFlag = SockFlag::empty();

/// Remove a socket file if present. A missing file is not an error.
pub fn remove_endpoint(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Check that a path is usable as a socket address.
pub fn validate_endpoint_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(MailboxError::Configuration(
            "endpoint path is empty".to_string(),
        ));
    }
    UnixAddr::new(path).map_err(|e| {
        MailboxError::Configuration(format!(
            "endpoint path {} is not a valid socket address: {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}

/// Convert a backlog setting into the kernel's accepted range.
pub fn listen_backlog(max_backlog: u32) -> Result<Backlog> {
    i32::try_from(max_backlog)
        .ok()
        .and_then(|n| Backlog::new(n).ok())
        .ok_or_else(|| {
            MailboxError::Configuration(format!(
                "backlog {} outside the range accepted by listen(2)",
                max_backlog
            ))
        })
}

/// Listening Unix Domain Socket that removes its file on drop.
#[derive(Debug)]
pub struct EndpointListener {
    listener: UnixListener,
    path: PathBuf,
}

impl EndpointListener {
    /// Bind to a Unix socket path and start listening.
    ///
    /// Removes any existing socket file at the path before binding. The
    /// listener is non-blocking so a spurious readiness report never stalls
    /// an accept.
    pub fn bind(path: impl AsRef<Path>, max_backlog: u32) -> Result<Self> {
        let path = path.as_ref();
        validate_endpoint_path(path)?;
        let backlog = listen_backlog(max_backlog)?;

        let fail = |stage: BindStage, source: io::Error| MailboxError::Bind {
            stage,
            path: path.to_path_buf(),
            source,
        };

        // In case a previous process exited without cleaning up
        remove_endpoint(path).map_err(|e| fail(BindStage::RemoveStale, e))?;

        let fd = socket::socket(AddressFamily::Unix, SockType::Stream, SOCKET_FLAGS, None)
            .map_err(|e| fail(BindStage::CreateSocket, e.into()))?;

        let addr = UnixAddr::new(path).map_err(|e| fail(BindStage::Bind, e.into()))?;
        socket::bind(fd.as_raw_fd(), &addr).map_err(|e| fail(BindStage::Bind, e.into()))?;

        // From here on the file exists and belongs to this listener.
        let listener = Self {
            listener: UnixListener::from(fd),
            path: path.to_path_buf(),
        };

        socket::listen(&listener.listener, backlog)
            .map_err(|e| fail(BindStage::Listen, e.into()))?;
        listener
            .listener
            .set_nonblocking(true)
            .map_err(|e| fail(BindStage::Listen, e))?;

        Ok(listener)
    }

    /// Accept a single pending connection.
    ///
    /// Returns `WouldBlock` if nothing is pending. The returned stream is
    /// always in blocking mode.
    pub fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _addr) = self.listener.accept()?;
        // BSD-derived systems hand out accepted sockets with the
        // listener's O_NONBLOCK.
        stream.set_nonblocking(false)?;
        Ok(stream)
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the underlying listener.
    pub fn inner(&self) -> &UnixListener {
        &self.listener
    }
}

impl Drop for EndpointListener {
    fn drop(&mut self) {
        let _ = remove_endpoint(&self.path);
    }
}

/// Connect a blocking stream to the endpoint at `path`.
pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();
    UnixStream::connect(path).map_err(|source| MailboxError::Connect {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_replaces_stale_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"left over").unwrap();

        let listener = EndpointListener::bind(&path, 4).unwrap();
        assert_eq!(listener.path(), path.as_path());
        assert!(path.exists());

        drop(listener);
        assert!(!path.exists());
    }

    #[test]
    fn test_accept_without_pending_connection_would_block() {
        let dir = tempfile::tempdir().unwrap();
        let listener = EndpointListener::bind(dir.path().join("idle.sock"), 4).unwrap();

        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_connect_and_accept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.sock");
        let listener = EndpointListener::bind(&path, 4).unwrap();

        let _client = connect(&path).unwrap();
        let server_side = listener.accept().unwrap();

        // Accepted streams block, even though the listener does not
        server_side
            .set_read_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();
    }

    #[test]
    fn test_connect_to_missing_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let err = connect(dir.path().join("nobody.sock")).unwrap_err();
        assert!(matches!(err, MailboxError::Connect { .. }));
    }

    #[test]
    fn test_bind_into_missing_directory_fails_at_bind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("x.sock");

        let err = EndpointListener::bind(&path, 4).unwrap_err();
        assert!(matches!(
            err,
            MailboxError::Bind {
                stage: BindStage::Bind,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_paths_are_configuration_errors() {
        assert!(matches!(
            validate_endpoint_path(Path::new("")),
            Err(MailboxError::Configuration(_))
        ));

        let long = PathBuf::from(format!("/tmp/{}", "x".repeat(200)));
        assert!(matches!(
            validate_endpoint_path(&long),
            Err(MailboxError::Configuration(_))
        ));
    }

    #[test]
    fn test_backlog_range() {
        assert!(listen_backlog(0).is_ok());
        assert!(listen_backlog(30).is_ok());
        assert!(matches!(
            listen_backlog(u32::MAX),
            Err(MailboxError::Configuration(_))
        ));
    }
}
