//! Handler module - the application side of a mailbox exchange.
//!
//! Provides:
//! - [`RequestHandler`] - turns one request into one reply
//! - [`EchoHandler`] - replies with the request unchanged
//!
//! Any `FnMut(&str, Payload) -> HandlerResult` closure is a handler too.
//!
//! # Example
//!
//! ```
//! use unix_mailbox::handler::{HandlerResult, RequestHandler};
//! use unix_mailbox::protocol::Payload;
//!
//! let mut greet = |sender: &str, _request: Payload| -> HandlerResult {
//!     Ok(Payload::from(vec![format!("hello {sender}")]))
//! };
//!
//! let reply = greet.handle_request("alice", Payload::new()).unwrap();
//! assert_eq!(reply.frame_str(0), Some("hello alice"));
//! ```

mod echo;

pub use echo::EchoHandler;

use crate::protocol::Payload;

/// Error a handler may return. The server logs it and drops the connection.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler calls.
pub type HandlerResult = std::result::Result<Payload, HandlerError>;

/// Application logic invoked once per received request.
///
/// Called on the server's event-loop thread, one request at a time. The
/// `sender` is the user name resolved from the connection's credentials.
///
/// Returning an empty [`Payload`] sends nothing back; the client keeps
/// waiting. Returning `Err` closes the connection, and so does a panic,
/// which is caught at the call site. Whatever state the handler held when it
/// panicked is kept for later requests.
pub trait RequestHandler {
    /// Handle one request and produce the reply.
    fn handle_request(&mut self, sender: &str, request: Payload) -> HandlerResult;
}

impl<F> RequestHandler for F
where
    F: FnMut(&str, Payload) -> HandlerResult,
{
    fn handle_request(&mut self, sender: &str, request: Payload) -> HandlerResult {
        self(sender, request)
    }
}
