//! Error types for unix-mailbox.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::handler::HandlerError;
use crate::identity::IdentityError;

/// Main error type for all mailbox operations.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Misuse of the API or an invalid setting (duplicate initialize,
    /// run before initialize, unusable path or backlog).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Creating the listening endpoint failed.
    #[error("Failed to {stage} for {}: {source}", .path.display())]
    Bind {
        /// Which setup step failed.
        stage: BindStage,
        /// Endpoint path being set up.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Client could not reach the server endpoint.
    #[error("Failed to connect to {}: {source}", .path.display())]
    Connect {
        /// Endpoint path the client tried.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed or interrupted frame stream.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The sender of a connection could not be identified.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// The request handler reported a failure.
    #[error("Request handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// I/O error outside of frame decoding (poll failure, reply write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailboxError {
    /// Whether this error came from a read or write timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Protocol(e) => e.is_timeout(),
            Self::Io(e) => is_timeout_kind(e.kind()),
            _ => false,
        }
    }
}

/// Setup step reported by [`MailboxError::Bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStage {
    /// Removing a stale endpoint file left by a previous process.
    RemoveStale,
    /// Creating the socket descriptor.
    CreateSocket,
    /// Binding the socket to its path.
    Bind,
    /// Switching the socket to listening mode.
    Listen,
    /// Creating the private wake channel.
    WakeChannel,
}

impl fmt::Display for BindStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::RemoveStale => "remove stale endpoint",
            Self::CreateSocket => "create socket",
            Self::Bind => "bind socket",
            Self::Listen => "listen on socket",
            Self::WakeChannel => "create wake channel",
        };
        f.write_str(stage)
    }
}

/// Position in the wire format where decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Leading frame count.
    FrameCount,
    /// Length prefix of the frame at the given index.
    FrameLength(usize),
    /// Content bytes of the frame at the given index.
    FrameContent(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameCount => f.write_str("frame count"),
            Self::FrameLength(index) => write!(f, "length of frame {index}"),
            Self::FrameContent(index) => write!(f, "content of frame {index}"),
        }
    }
}

/// Framing violations. Always fatal to one connection or request, never to
/// the server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Peer closed the connection before sending any byte of a message.
    #[error("Peer disconnected")]
    Disconnected,

    /// Stream ended in the middle of a field.
    #[error("Stream ended while reading {0}")]
    Truncated(Field),

    /// A frame with no content, on either side of the wire.
    #[error("Frame {index} is empty")]
    EmptyFrame {
        /// Index of the offending frame.
        index: usize,
    },

    /// A frame whose last byte is not the NUL sentinel.
    #[error("Frame {index} is missing its trailing sentinel")]
    MissingSentinel {
        /// Index of the offending frame.
        index: usize,
    },

    /// Frame length exceeds the configured or representable maximum.
    #[error("Frame {index} length {len} exceeds maximum {max}")]
    FrameTooLarge {
        /// Index of the offending frame.
        index: usize,
        /// Declared or actual length.
        len: u64,
        /// Maximum accepted length.
        max: u64,
    },

    /// Frame count exceeds the configured or representable maximum.
    #[error("Frame count {count} exceeds maximum {max}")]
    TooManyFrames {
        /// Declared or actual count.
        count: u64,
        /// Maximum accepted count.
        max: u64,
    },

    /// Underlying read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the underlying I/O error was a socket timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(e) if is_timeout_kind(e.kind()))
    }
}

/// Socket timeouts surface as `WouldBlock` on Unix and `TimedOut` elsewhere.
fn is_timeout_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// Result type alias using MailboxError.
pub type Result<T> = std::result::Result<T, MailboxError>;
