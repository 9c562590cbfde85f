//! Protocol module - payload type and frame codec.
//!
//! This module implements the binary format shared by server and client:
//! - [`Payload`]: ordered frames of one request or reply
//! - [`encode`] / [`decode`]: one message to/from a byte stream
//! - [`FrameLimits`]: bounds a decoder applies to untrusted input

mod codec;
mod payload;

pub use codec::{
    decode, decode_with_limits, encode, encoded_len, write_payload, FrameLimits, FRAME_SENTINEL,
    LENGTH_FIELD_SIZE,
};
pub use payload::Payload;
