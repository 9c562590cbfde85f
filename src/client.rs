//! Blocking one-shot client.
//!
//! Each [`SyncClient::send_request`] opens a fresh connection, writes one
//! request, waits for one reply and closes the connection. The client holds
//! no socket between calls, so one instance can be shared across threads.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use unix_mailbox::{Payload, SyncClient};
//!
//! fn main() -> unix_mailbox::Result<()> {
//!     let client = SyncClient::new("/tmp/echo.sock").read_timeout(Duration::from_secs(5));
//!     let reply = client.send_request(&Payload::from(["This", "is", "a", "test"]))?;
//!     assert_eq!(reply.len(), 4);
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use crate::error::Result;
use crate::protocol::{decode_with_limits, write_payload, FrameLimits, Payload};
use crate::transport::connect;

/// Client for a [`MailboxServer`](crate::MailboxServer) endpoint.
#[derive(Debug, Clone)]
pub struct SyncClient {
    path: PathBuf,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    frame_limits: FrameLimits,
}

impl SyncClient {
    /// Client for the endpoint at `path`. No timeouts by default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_timeout: None,
            write_timeout: None,
            frame_limits: FrameLimits::default(),
        }
    }

    /// Bound the wait for a reply. A zero duration means no bound.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = non_zero(timeout);
        self
    }

    /// Bound the time spent writing a request. A zero duration means no bound.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = non_zero(timeout);
        self
    }

    /// Set the bounds applied when decoding replies.
    ///
    /// Default: unbounded
    pub fn frame_limits(mut self, limits: FrameLimits) -> Self {
        self.frame_limits = limits;
        self
    }

    /// Endpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one request and wait for its reply.
    ///
    /// The connection is closed before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::Connect`](crate::MailboxError::Connect) if the
    ///   endpoint cannot be reached
    /// - [`MailboxError::Protocol`](crate::MailboxError::Protocol) if the
    ///   request cannot be encoded or the reply is malformed, cut short or
    ///   times out (see [`MailboxError::is_timeout`](crate::MailboxError::is_timeout))
    pub fn send_request(&self, request: &Payload) -> Result<Payload> {
        let stream = connect(&self.path)?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;

        trace!(path = %self.path.display(), frames = request.len(), "Sending request");
        write_payload(&mut &stream, request)?;

        let reply = decode_with_limits(&mut &stream, &self.frame_limits)?;
        trace!(path = %self.path.display(), frames = reply.len(), "Received reply");
        Ok(reply)
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MailboxError, ProtocolError};
    use crate::protocol::{decode, encode};
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::thread;

    #[test]
    fn test_zero_timeout_means_none() {
        let client = SyncClient::new("/tmp/x.sock")
            .read_timeout(Duration::ZERO)
            .write_timeout(Duration::from_millis(5));
        assert_eq!(client.read_timeout, None);
        assert_eq!(client.write_timeout, Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_missing_endpoint_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = SyncClient::new(dir.path().join("absent.sock"));
        let err = client.send_request(&Payload::from(["x"])).unwrap_err();
        assert!(matches!(err, MailboxError::Connect { .. }));
    }

    #[test]
    fn test_round_trip_against_raw_peer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = decode(&mut stream).unwrap();
            let mut reply = request.clone();
            reply.push("ack");
            stream.write_all(&encode(&reply).unwrap()).unwrap();
            request
        });

        let reply = SyncClient::new(&path)
            .send_request(&Payload::from(["hello"]))
            .unwrap();
        assert_eq!(reply, Payload::from(["hello", "ack"]));
        assert_eq!(peer.join().unwrap(), Payload::from(["hello"]));
    }

    #[test]
    fn test_peer_closing_without_reply_is_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rude.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            decode(&mut stream).unwrap();
        });

        let err = SyncClient::new(&path)
            .send_request(&Payload::from(["hello"]))
            .unwrap_err();
        peer.join().unwrap();
        assert!(matches!(
            err,
            MailboxError::Protocol(ProtocolError::Disconnected)
        ));
    }

    #[test]
    fn test_empty_frame_request_fails_before_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strict.sock");
        let _listener = UnixListener::bind(&path).unwrap();

        let err = SyncClient::new(&path)
            .send_request(&Payload::from([""]))
            .unwrap_err();
        assert!(matches!(
            err,
            MailboxError::Protocol(ProtocolError::EmptyFrame { index: 0 })
        ));
    }

    #[test]
    fn test_client_is_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncClient>();
    }
}
