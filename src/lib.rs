//! # unix-mailbox
//!
//! Local request/reply mailbox over a Unix Domain Socket.
//!
//! Many client processes each send one multi-frame request to a single
//! server process and block for one multi-frame reply. The server learns
//! who is calling from kernel-supplied peer credentials and passes the user
//! name to the application's [`RequestHandler`].
//!
//! ## Architecture
//!
//! - **Server** ([`MailboxServer`]): one thread multiplexing the listening
//!   socket, every open connection and a private wake channel with `poll(2)`
//! - **Client** ([`SyncClient`]): one connection per request, closed after
//!   the reply
//! - **Wire format** ([`protocol`]): frame count, then length-prefixed
//!   NUL-terminated frames, all in host byte order
//!
//! ## Example
//!
//! ```no_run
//! use std::thread;
//! use unix_mailbox::{EchoHandler, MailboxServer, Payload, ServerConfig, SyncClient};
//!
//! fn main() -> unix_mailbox::Result<()> {
//!     let path = "/tmp/echo.sock";
//!     let mut server = MailboxServer::bind(ServerConfig::new(path), EchoHandler)?;
//!     let stop = server.stop_handle();
//!     let worker = thread::spawn(move || server.run());
//!
//!     let reply = SyncClient::new(path).send_request(&Payload::from(["This", "is", "a", "test"]))?;
//!     assert_eq!(reply.frame_str(3), Some("test"));
//!
//!     stop.request_stop();
//!     worker.join().expect("server thread panicked")
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod protocol;
pub mod transport;

mod client;
mod server;

pub use client::SyncClient;
pub use config::{ServerConfig, DEFAULT_MAX_BACKLOG};
pub use error::{BindStage, MailboxError, ProtocolError, Result};
pub use handler::{EchoHandler, HandlerError, HandlerResult, RequestHandler};
pub use identity::{IdentityError, IdentityResolver, PeerCredentialResolver, SenderIdentity};
pub use protocol::{FrameLimits, Payload};
pub use server::{MailboxServer, StopHandle};
