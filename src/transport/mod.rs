//! Transport module - Unix Domain Socket endpoint handling.
//!
//! Provides:
//! - [`EndpointListener`] - listening socket that owns its filesystem path
//! - [`connect`] - blocking client connection

mod endpoint;

pub use endpoint::{
    connect, listen_backlog, remove_endpoint, validate_endpoint_path, EndpointListener,
};
