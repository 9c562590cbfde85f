//! Server configuration.
//!
//! # Example
//!
//! ```
//! use unix_mailbox::config::ServerConfig;
//! use unix_mailbox::protocol::FrameLimits;
//!
//! let config = ServerConfig::new("/tmp/mailbox.sock")
//!     .max_backlog(64)
//!     .frame_limits(FrameLimits::new(64 * 1024, 16));
//!
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::protocol::FrameLimits;
use crate::transport::{listen_backlog, validate_endpoint_path};

/// Default limit on connections waiting to be accepted.
pub const DEFAULT_MAX_BACKLOG: u32 = 30;

/// Settings for a [`MailboxServer`](crate::MailboxServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    path: PathBuf,
    max_backlog: u32,
    frame_limits: FrameLimits,
}

impl ServerConfig {
    /// Configuration for an endpoint at `path` with default tunables.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_backlog: DEFAULT_MAX_BACKLOG,
            frame_limits: FrameLimits::default(),
        }
    }

    /// Set the kernel accept backlog.
    ///
    /// Default: 30
    pub fn max_backlog(mut self, backlog: u32) -> Self {
        self.max_backlog = backlog;
        self
    }

    /// Set the bounds applied when decoding requests.
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

    /// Accept backlog.
    pub fn backlog(&self) -> u32 {
        self.max_backlog
    }

    /// Request decoding limits.
    pub fn limits(&self) -> &FrameLimits {
        &self.frame_limits
    }

    /// Check the path and backlog without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint_path(&self.path)?;
        listen_backlog(self.max_backlog)?;
        Ok(())
    }
}
