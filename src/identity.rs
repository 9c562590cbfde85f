//! Sender identification from kernel-supplied connection credentials.
//!
//! The server resolves a [`SenderIdentity`] for a connection before any of
//! its data reaches the handler. [`PeerCredentialResolver`] asks the kernel
//! for the peer's user id (`SO_PEERCRED` on Linux/Android, `getpeereid`
//! elsewhere) and maps it through the password database.

use std::fmt;
use std::os::unix::net::UnixStream;

use nix::unistd::{Uid, User};
use thiserror::Error;

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    uid: u32,
    pid: Option<i32>,
    name: String,
}

impl SenderIdentity {
    /// Create an identity from already known parts.
    pub fn new(uid: u32, pid: Option<i32>, name: impl Into<String>) -> Self {
        Self {
            uid,
            pid,
            name: name.into(),
        }
    }

    /// Peer user id.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Peer process id, where the platform reports it.
    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    /// Peer user name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (uid {})", self.name, self.uid)
    }
}

/// Failure to identify a peer. Fatal to the connection only.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The kernel did not supply credentials for the socket.
    #[error("Failed to read peer credentials: {0}")]
    Credentials(#[source] std::io::Error),

    /// The password database has no entry for the uid.
    #[error("No user entry for uid {uid}")]
    UnknownUser {
        /// Peer user id.
        uid: u32,
    },

    /// The password database lookup itself failed.
    #[error("User lookup for uid {uid} failed: {source}")]
    Lookup {
        /// Peer user id.
        uid: u32,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Resolves the identity of a connected peer.
///
/// `Send` so a server owning a resolver can be moved onto its loop thread.
pub trait IdentityResolver: Send {
    /// Identify the peer of `stream`.
    fn resolve(&self, stream: &UnixStream) -> Result<SenderIdentity, IdentityError>;
}

/// Default resolver backed by the kernel's peer credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerCredentialResolver;

impl PeerCredentialResolver {
    /// Raw peer uid and, where available, pid.
    pub fn peer_credentials(stream: &UnixStream) -> Result<(u32, Option<i32>), IdentityError> {
        peer_credentials(stream)
    }
}

impl IdentityResolver for PeerCredentialResolver {
    fn resolve(&self, stream: &UnixStream) -> Result<SenderIdentity, IdentityError> {
        let (uid, pid) = peer_credentials(stream)?;
        let name = user_name(uid)?;
        Ok(SenderIdentity::new(uid, pid, name))
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn peer_credentials(stream: &UnixStream) -> Result<(u32, Option<i32>), IdentityError> {
    use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};

    let creds = getsockopt(stream, PeerCredentials)
        .map_err(|e| IdentityError::Credentials(e.into()))?;
    Ok((creds.uid(), Some(creds.pid())))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn peer_credentials(stream: &UnixStream) -> Result<(u32, Option<i32>), IdentityError> {
    use std::os::fd::AsFd;

    let (uid, _gid) = nix::unistd::getpeereid(stream.as_fd())
        .map_err(|e| IdentityError::Credentials(e.into()))?;
    Ok((uid.as_raw(), None))
}

/// Look up the login name for `uid`.
pub fn user_name(uid: u32) -> Result<String, IdentityError> {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(IdentityError::UnknownUser { uid }),
        Err(e) => Err(IdentityError::Lookup {
            uid,
            source: e.into(),
        }),
    }
}
