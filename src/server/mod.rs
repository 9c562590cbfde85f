//! Mailbox server - accepts connections and answers one request at a time.
//!
//! The [`MailboxServer`] lifecycle:
//! 1. [`new`](MailboxServer::new) - no OS resources yet
//! 2. [`initialize`](MailboxServer::initialize) - bind the endpoint, create
//!    the wake channel
//! 3. [`run`](MailboxServer::run) - block serving until stopped, repeatable
//! 4. drop - close everything and remove the endpoint path
//!
//! # Example
//!
//! ```no_run
//! use std::thread;
//! use unix_mailbox::{EchoHandler, MailboxServer, ServerConfig};
//!
//! fn main() -> unix_mailbox::Result<()> {
//!     let mut server = MailboxServer::bind(ServerConfig::new("/tmp/echo.sock"), EchoHandler)?;
//!     let stop = server.stop_handle();
//!
//!     let worker = thread::spawn(move || server.run());
//!     // ... later, from any thread
//!     stop.request_stop();
//!     worker.join().expect("server thread panicked")?;
//!     Ok(())
//! }
//! ```

mod connection;
mod event_loop;
mod stop;

pub use stop::StopHandle;

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{BindStage, MailboxError, Result};
use crate::handler::RequestHandler;
use crate::identity::{IdentityResolver, PeerCredentialResolver};
use crate::transport::{remove_endpoint, EndpointListener};

use event_loop::EventLoop;
use stop::Shared;

/// OS resources that exist once the server is initialized.
#[derive(Debug)]
struct Endpoint {
    listener: EndpointListener,
    wake_rx: UnixStream,
}

/// Single-threaded request/reply server on a Unix socket path.
pub struct MailboxServer<H> {
    config: ServerConfig,
    handler: H,
    resolver: Box<dyn IdentityResolver>,
    endpoint: Option<Endpoint>,
    shared: Arc<Shared>,
    next_conn_id: u64,
}

impl<H: RequestHandler> MailboxServer<H> {
    /// Create a server without touching the filesystem.
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            resolver: Box::new(PeerCredentialResolver),
            endpoint: None,
            shared: Arc::new(Shared::default()),
            next_conn_id: 0,
        }
    }

    /// Create and initialize a server.
    pub fn bind(config: ServerConfig, handler: H) -> Result<Self> {
        let mut server = Self::new(config, handler);
        server.initialize()?;
        Ok(server)
    }

    /// Replace the peer-credential resolver.
    pub fn with_identity_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Bind the listening endpoint and create the wake channel.
    ///
    /// A stale file at the endpoint path is removed first.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::Configuration`] if already initialized or the
    ///   configuration is invalid
    /// - [`MailboxError::Bind`] if any socket setup step fails
    pub fn initialize(&mut self) -> Result<()> {
        if self.endpoint.is_some() {
            return Err(MailboxError::Configuration(format!(
                "server for {} is already initialized",
                self.config.path().display()
            )));
        }
        self.config.validate()?;

        let listener = EndpointListener::bind(self.config.path(), self.config.backlog())?;

        let wake_error = |source| MailboxError::Bind {
            stage: BindStage::WakeChannel,
            path: self.config.path().to_path_buf(),
            source,
        };
        let (wake_rx, wake_tx) = UnixStream::pair().map_err(wake_error)?;
        wake_rx.set_nonblocking(true).map_err(wake_error)?;
        wake_tx.set_nonblocking(true).map_err(wake_error)?;

        if !self.shared.install_waker(wake_tx) {
            return Err(MailboxError::Configuration(
                "wake channel already installed".to_string(),
            ));
        }

        info!(
            path = %self.config.path().display(),
            backlog = self.config.backlog(),
            "Mailbox server bound"
        );

        self.endpoint = Some(Endpoint { listener, wake_rx });
        Ok(())
    }

    /// Serve requests on the calling thread until a stop is requested.
    ///
    /// Returns once the stop has been observed and every connection is
    /// closed. The server can be run again afterwards.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::Configuration`] if not initialized or already running
    /// - [`MailboxError::Io`] if polling fails; connections are closed first
    pub fn run(&mut self) -> Result<()> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            MailboxError::Configuration("run called before initialize".to_string())
        })?;
        if self.shared.is_running() {
            return Err(MailboxError::Configuration(
                "server is already running".to_string(),
            ));
        }

        self.shared.begin_run(&endpoint.wake_rx);
        info!(path = %self.config.path().display(), "Mailbox server running");

        let event_loop = EventLoop {
            listener: &endpoint.listener,
            wake_rx: &endpoint.wake_rx,
            shared: &self.shared,
            resolver: self.resolver.as_ref(),
            handler: &mut self.handler,
            limits: *self.config.limits(),
            next_conn_id: &mut self.next_conn_id,
            connections: Vec::new(),
        };
        let result = event_loop.run();

        self.shared.end_run();
        info!(path = %self.config.path().display(), "Mailbox server stopped");
        result
    }
}

impl<H> MailboxServer<H> {
    /// Handle for stopping [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.shared.clone())
    }

    /// Request that a running loop exit. No-op when not running.
    pub fn request_stop(&self) {
        self.stop_handle().request_stop();
    }

    /// Endpoint path.
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Whether a run loop is active.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Open connections in the current run.
    pub fn connection_count(&self) -> usize {
        self.shared.connection_count()
    }
}

impl<H> std::fmt::Debug for MailboxServer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxServer")
            .field("path", &self.config.path())
            .field("initialized", &self.is_initialized())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<H> Drop for MailboxServer<H> {
    fn drop(&mut self) {
        // The listener removes the path itself; an uninitialized server
        // still clears whatever sits there.
        if self.endpoint.take().is_none() {
            let _ = remove_endpoint(self.config.path());
        }
        debug!(path = %self.config.path().display(), "Mailbox server dropped");
    }
}
