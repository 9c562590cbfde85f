//! The blocking readiness loop behind [`MailboxServer::run`](super::MailboxServer::run).
//!
//! One `poll(2)` set holds the wake channel, the listening socket and every
//! open connection. All work happens on the calling thread.

use std::io::ErrorKind;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, error, warn};

use super::connection::{Connection, Exchange};
use super::stop::{drain_wake, Shared};
use crate::error::{MailboxError, ProtocolError, Result};
use crate::handler::RequestHandler;
use crate::identity::IdentityResolver;
use crate::protocol::FrameLimits;
use crate::transport::EndpointListener;

const WAKE_SLOT: usize = 0;
const LISTENER_SLOT: usize = 1;
const FIRST_CONN_SLOT: usize = 2;

/// Loop state that lives for exactly one run.
pub(super) struct EventLoop<'a, H> {
    pub(super) listener: &'a EndpointListener,
    pub(super) wake_rx: &'a UnixStream,
    pub(super) shared: &'a Shared,
    pub(super) resolver: &'a dyn IdentityResolver,
    pub(super) handler: &'a mut H,
    pub(super) limits: FrameLimits,
    pub(super) next_conn_id: &'a mut u64,
    pub(super) connections: Vec<Connection>,
}

impl<H: RequestHandler> EventLoop<'_, H> {
    /// Serve until a stop is observed or polling fails.
    ///
    /// Every connection is closed before this returns, on both paths.
    pub(super) fn run(mut self) -> Result<()> {
        let result = self.serve();

        let open = self.connections.len();
        self.connections.clear();
        self.shared.set_connection_count(0);
        debug!(closed = open, "Closed connections");

        result
    }

    fn serve(&mut self) -> Result<()> {
        loop {
            if self.shared.stop_requested() {
                return Ok(());
            }

            let ready = match self.wait() {
                Ok(ready) => ready,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    error!(error = %errno, "poll failed");
                    return Err(MailboxError::Io(errno.into()));
                }
            };

            if ready[WAKE_SLOT] {
                drain_wake(self.wake_rx);
                if self.shared.stop_requested() {
                    return Ok(());
                }
            }

            // Slots past the listener map onto the connections that existed
            // when poll was called; an accepted stream is only appended below.
            let conn_ready = ready[FIRST_CONN_SLOT..].to_vec();

            if ready[LISTENER_SLOT] {
                self.accept_one();
            }

            if !self.serve_ready(&conn_ready) {
                return Ok(());
            }
        }
    }

    /// Block until at least one descriptor is readable or hung up.
    fn wait(&self) -> std::result::Result<Vec<bool>, Errno> {
        let mut fds = Vec::with_capacity(FIRST_CONN_SLOT + self.connections.len());
        fds.push(PollFd::new(self.wake_rx.as_fd(), PollFlags::POLLIN));
        fds.push(PollFd::new(self.listener.inner().as_fd(), PollFlags::POLLIN));
        fds.extend(
            self.connections
                .iter()
                .map(|conn| PollFd::new(conn.as_fd(), PollFlags::POLLIN)),
        );

        poll(&mut fds, PollTimeout::NONE)?;

        let interesting = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        Ok(fds
            .iter()
            .map(|fd| fd.revents().is_some_and(|r| r.intersects(interesting)))
            .collect())
    }

    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok(stream) => {
                *self.next_conn_id += 1;
                let id = *self.next_conn_id;
                self.connections.push(Connection::new(id, stream));
                self.shared.set_connection_count(self.connections.len());
                debug!(conn = id, open = self.connections.len(), "Accepted connection");
            }
            // Peer gave up between readiness and accept
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("No pending connection to accept");
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }

    /// Run one exchange on each ready connection, evicting any that fault.
    ///
    /// Returns `false` if a stop was observed part way through.
    fn serve_ready(&mut self, ready: &[bool]) -> bool {
        let mut evicted = Vec::new();
        let mut stopped = false;

        for (conn, _) in self
            .connections
            .iter_mut()
            .zip(ready)
            .filter(|(_, is_ready)| **is_ready)
        {
            if self.shared.stop_requested() {
                stopped = true;
                break;
            }

            match conn.exchange(self.resolver, &mut *self.handler, &self.limits) {
                Ok(Exchange::Replied(frames)) => {
                    debug!(conn = conn.id(), frames, "Sent reply");
                }
                Ok(Exchange::Silent) => {
                    debug!(conn = conn.id(), "Handler returned empty reply, nothing sent");
                }
                Err(MailboxError::Protocol(ProtocolError::Disconnected)) => {
                    debug!(conn = conn.id(), "Peer closed connection");
                    evicted.push(conn.id());
                }
                Err(e) => {
                    warn!(conn = conn.id(), error = %e, "Closing connection after fault");
                    evicted.push(conn.id());
                }
            }
        }

        if !evicted.is_empty() {
            self.connections.retain(|conn| !evicted.contains(&conn.id()));
            self.shared.set_connection_count(self.connections.len());
        }

        !stopped
    }
}
