//! One accepted client connection and its request/reply exchange.

use std::any::Any;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::error::{MailboxError, Result};
use crate::handler::RequestHandler;
use crate::identity::{IdentityResolver, SenderIdentity};
use crate::protocol::{decode_with_limits, write_payload, FrameLimits};

/// What a completed exchange sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exchange {
    /// A reply with this many frames was written.
    Replied(usize),
    /// The handler returned nothing, so nothing was written.
    Silent,
}

#[derive(Debug)]
pub(crate) struct Connection {
    id: u64,
    stream: UnixStream,
    /// Filled on first readiness, before any data is decoded.
    identity: Option<SenderIdentity>,
}

impl Connection {
    pub(crate) fn new(id: u64, stream: UnixStream) -> Self {
        Self {
            id,
            stream,
            identity: None,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Serve one request: identify the peer once, read, dispatch, reply.
    ///
    /// A panicking handler is reported as [`MailboxError::Handler`]. Any
    /// error leaves the stream in an unknown state; the caller must close
    /// the connection.
    pub(crate) fn exchange<H: RequestHandler>(
        &mut self,
        resolver: &dyn IdentityResolver,
        handler: &mut H,
        limits: &FrameLimits,
    ) -> Result<Exchange> {
        let sender = match self.identity {
            Some(ref identity) => identity,
            None => {
                let identity = resolver.resolve(&self.stream)?;
                debug!(conn = self.id, sender = %identity, "Resolved sender");
                &*self.identity.insert(identity)
            }
        };

        let request = decode_with_limits(&mut &self.stream, limits)?;

        debug!(
            conn = self.id,
            sender = sender.name(),
            frames = request.len(),
            "Dispatching request"
        );

        let reply = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle_request(sender.name(), request)
        }))
        .map_err(|panic| MailboxError::Handler(panic_message(panic).into()))?
        .map_err(MailboxError::Handler)?;

        if reply.is_empty() {
            return Ok(Exchange::Silent);
        }

        write_payload(&mut &self.stream, &reply)?;
        Ok(Exchange::Replied(reply.len()))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("handler panicked: {detail}")
}

impl AsFd for Connection {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
