//! Wire format encoding and decoding.
//!
//! A message is a frame count followed by that many length-prefixed frames:
//! ```text
//! ┌──────────┬──────────┬───────────────┬───┬──────────┬───────────────┐
//! │ Count N  │ Len L₀   │ Frame 0 + NUL │ … │ Len Lₙ₋₁ │ Frame N-1+NUL │
//! │ 4 bytes  │ 4 bytes  │ L₀ bytes      │   │ 4 bytes  │ Lₙ₋₁ bytes    │
//! │ u32 (NE) │ u32 (NE) │               │   │ u32 (NE) │               │
//! └──────────┴──────────┴───────────────┴───┴──────────┴───────────────┘
//! ```
//!
//! All integers are in host-native byte order; both ends of a Unix socket
//! live on the same machine. Each length counts the frame content plus one
//! trailing NUL sentinel, so a valid length is never smaller than 2.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::Payload;
use crate::error::{Field, ProtocolError};

/// Size of the frame count and of each frame length prefix.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Byte appended to every frame on the wire.
pub const FRAME_SENTINEL: u8 = 0x00;

/// Upper bound on buffer space reserved before content has actually arrived.
const READ_CHUNK: usize = 64 * 1024;

/// Bounds a decoder applies to declared lengths and counts.
///
/// Limits only restrict what is accepted; they never change what goes on
/// the wire. The default accepts every message [`encode`] can produce, so
/// bounding untrusted peers is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest accepted frame length field (content plus sentinel).
    pub max_frame_len: u32,
    /// Largest accepted frame count.
    pub max_frames: u32,
}

impl FrameLimits {
    /// Create limits with explicit bounds.
    pub fn new(max_frame_len: u32, max_frames: u32) -> Self {
        Self {
            max_frame_len,
            max_frames,
        }
    }

    /// Limits that accept anything representable on the wire.
    pub fn unbounded() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Number of bytes `payload` occupies on the wire.
pub fn encoded_len(payload: &Payload) -> usize {
    payload.iter().fold(LENGTH_FIELD_SIZE, |acc, frame| {
        acc + LENGTH_FIELD_SIZE + frame.len() + 1
    })
}

/// Encode a payload into a single contiguous buffer.
///
/// # Errors
///
/// - [`ProtocolError::EmptyFrame`] if any frame has no content
/// - [`ProtocolError::TooManyFrames`] / [`ProtocolError::FrameTooLarge`] if a
///   count or length does not fit the 32-bit wire fields
///
/// # Example
///
/// ```
/// use unix_mailbox::protocol::{encode, encoded_len, Payload};
///
/// let payload = Payload::from(["hi"]);
/// let bytes = encode(&payload).unwrap();
/// assert_eq!(bytes.len(), encoded_len(&payload));
/// assert_eq!(&bytes[8..], b"hi\0");
/// ```
pub fn encode(payload: &Payload) -> Result<Bytes, ProtocolError> {
    let count = u32::try_from(payload.len()).map_err(|_| ProtocolError::TooManyFrames {
        count: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut buf = BytesMut::with_capacity(encoded_len(payload));
    buf.put_u32_ne(count);

    for (index, frame) in payload.iter().enumerate() {
        if frame.is_empty() {
            return Err(ProtocolError::EmptyFrame { index });
        }

        let len = frame
            .len()
            .checked_add(1)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or(ProtocolError::FrameTooLarge {
                index,
                len: frame.len() as u64,
                max: u64::from(u32::MAX) - 1,
            })?;

        buf.put_u32_ne(len);
        buf.put_slice(frame);
        buf.put_u8(FRAME_SENTINEL);
    }

    Ok(buf.freeze())
}

/// Encode a payload and write it to `writer` in one piece, then flush.
pub fn write_payload<W: Write>(writer: &mut W, payload: &Payload) -> Result<(), ProtocolError> {
    let bytes = encode(payload)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Decode exactly one payload from `reader`.
///
/// Accepts any count and length the wire fields can carry; use
/// [`decode_with_limits`] to bound them.
pub fn decode<R: Read>(reader: &mut R) -> Result<Payload, ProtocolError> {
    decode_with_limits(reader, &FrameLimits::unbounded())
}

/// Decode exactly one payload from `reader`.
///
/// Reads precisely the bytes of one message and nothing past it, so a
/// subsequent message on the same stream stays intact.
///
/// # Errors
///
/// - [`ProtocolError::Disconnected`] if the stream ends before the first byte
/// - [`ProtocolError::Truncated`] if it ends in the middle of a field
/// - [`ProtocolError::EmptyFrame`] if a frame declares length 0 or carries
///   only the sentinel
/// - [`ProtocolError::MissingSentinel`] if a frame does not end in NUL
/// - [`ProtocolError::TooManyFrames`] / [`ProtocolError::FrameTooLarge`] if a
///   declared value exceeds `limits`
/// - [`ProtocolError::Io`] on any other read failure, including timeouts
pub fn decode_with_limits<R: Read>(
    reader: &mut R,
    limits: &FrameLimits,
) -> Result<Payload, ProtocolError> {
    let count = read_field(reader, Field::FrameCount)?;
    if count > limits.max_frames {
        return Err(ProtocolError::TooManyFrames {
            count: u64::from(count),
            max: u64::from(limits.max_frames),
        });
    }

    let mut payload = Payload::with_capacity((count as usize).min(1024));

    for index in 0..count as usize {
        let len = read_field(reader, Field::FrameLength(index))?;
        if len == 0 {
            return Err(ProtocolError::EmptyFrame { index });
        }
        if len > limits.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                index,
                len: u64::from(len),
                max: u64::from(limits.max_frame_len),
            });
        }

        // Grow with the data actually received, not the declared length.
        let mut content = Vec::with_capacity((len as usize).min(READ_CHUNK));
        let read = reader
            .by_ref()
            .take(u64::from(len))
            .read_to_end(&mut content)?;
        if read < len as usize {
            return Err(ProtocolError::Truncated(Field::FrameContent(index)));
        }

        if content.pop() != Some(FRAME_SENTINEL) {
            return Err(ProtocolError::MissingSentinel { index });
        }
        if content.is_empty() {
            return Err(ProtocolError::EmptyFrame { index });
        }

        payload.push(content);
    }

    Ok(payload)
}

/// Read one native-endian `u32` field.
///
/// A clean end of stream before the frame count is a disconnect; anywhere
/// else it is truncation.
fn read_field<R: Read>(reader: &mut R, field: Field) -> Result<u32, ProtocolError> {
    let mut buf = [0u8; LENGTH_FIELD_SIZE];
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 && field == Field::FrameCount => {
                return Err(ProtocolError::Disconnected);
            }
            Ok(0) => return Err(ProtocolError::Truncated(field)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }

    Ok(u32::from_ne_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build raw wire bytes without going through `encode`, so tests can
    /// produce streams `encode` would refuse to.
    fn raw_message(frames: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(frames.len() as u32).to_ne_bytes());
        for frame in frames {
            bytes.extend_from_slice(&(frame.len() as u32).to_ne_bytes());
            bytes.extend_from_slice(frame);
        }
        bytes
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&Payload::from(["ab", "c"])).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_ne_bytes());
        expected.extend_from_slice(&3u32.to_ne_bytes());
        expected.extend_from_slice(b"ab\0");
        expected.extend_from_slice(&2u32.to_ne_bytes());
        expected.extend_from_slice(b"c\0");

        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_encode_empty_payload_is_count_only() {
        let bytes = encode(&Payload::new()).unwrap();
        assert_eq!(&bytes[..], &0u32.to_ne_bytes());
        assert_eq!(decode(&mut Cursor::new(bytes)).unwrap(), Payload::new());
    }

    #[test]
    fn test_encode_rejects_empty_frame() {
        let payload = Payload::from(["ok", "", "also ok"]);
        let err = encode(&payload).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame { index: 1 }));
    }

    #[test]
    fn test_decode_round_trip() {
        let payload = Payload::from(["This", "is", "a", "test"]);
        let bytes = encode(&payload).unwrap();
        let decoded = decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_keeps_interior_nul_bytes() {
        let payload = Payload::from(vec![b"a\0b".to_vec()]);
        let bytes = encode(&payload).unwrap();
        assert_eq!(decode(&mut Cursor::new(bytes)).unwrap(), payload);
    }

    #[test]
    fn test_decode_does_not_over_read() {
        let first = Payload::from(["first"]);
        let second = Payload::from(["second", "message"]);

        let mut stream = encode(&first).unwrap().to_vec();
        stream.extend_from_slice(&encode(&second).unwrap());

        let mut cursor = Cursor::new(stream);
        assert_eq!(decode(&mut cursor).unwrap(), first);
        assert_eq!(decode(&mut cursor).unwrap(), second);
        assert!(matches!(
            decode(&mut cursor),
            Err(ProtocolError::Disconnected)
        ));
    }

    #[test]
    fn test_decode_rejects_zero_length_frame() {
        let bytes = raw_message(&[b"fine\0", b""]);
        let err = decode(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame { index: 1 }));
    }

    #[test]
    fn test_decode_rejects_sentinel_only_frame() {
        let bytes = raw_message(&[b"\0"]);
        let err = decode(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame { index: 0 }));
    }

    #[test]
    fn test_decode_rejects_missing_sentinel() {
        let bytes = raw_message(&[b"abc"]);
        let err = decode(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingSentinel { index: 0 }));
    }

    #[test]
    fn test_decode_empty_stream_is_disconnect() {
        let err = decode(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
        assert!(matches!(err, ProtocolError::Disconnected));
    }

    #[test]
    fn test_decode_truncated_fields() {
        // Partial frame count
        let err = decode(&mut Cursor::new(vec![1u8, 0])).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated(Field::FrameCount)));

        // Count present, length missing
        let err = decode(&mut Cursor::new(1u32.to_ne_bytes().to_vec())).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated(Field::FrameLength(0))
        ));

        // Content shorter than declared
        let mut bytes = raw_message(&[b"abc\0"]);
        bytes.truncate(bytes.len() - 2);
        let err = decode(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated(Field::FrameContent(0))
        ));
    }

    #[test]
    fn test_decode_huge_declared_length_does_not_allocate_it() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_ne_bytes());
        bytes.extend_from_slice(&u32::MAX.to_ne_bytes());
        bytes.extend_from_slice(b"short\0");

        let err = decode_with_limits(&mut Cursor::new(bytes), &FrameLimits::unbounded())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated(Field::FrameContent(0))
        ));
    }

    #[test]
    fn test_decode_enforces_limits() {
        let limits = FrameLimits::new(4, 2);

        let bytes = raw_message(&[b"abcd\0"]);
        let err = decode_with_limits(&mut Cursor::new(bytes), &limits).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge { index: 0, len: 5, max: 4 }
        ));

        let bytes = raw_message(&[b"a\0", b"b\0", b"c\0"]);
        let err = decode_with_limits(&mut Cursor::new(bytes), &limits).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TooManyFrames { count: 3, max: 2 }
        ));

        let bytes = raw_message(&[b"abc\0", b"d\0"]);
        let payload = decode_with_limits(&mut Cursor::new(bytes), &limits).unwrap();
        assert_eq!(payload, Payload::from(["abc", "d"]));
    }

    #[test]
    fn test_decode_accepts_more_than_a_million_frames() {
        let count = (1usize << 20) + 1;
        let payload: Payload = std::iter::repeat("a").take(count).collect();

        let bytes = encode(&payload).unwrap();
        let decoded = decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.len(), count);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_default_limits_are_unbounded() {
        assert_eq!(FrameLimits::default(), FrameLimits::unbounded());
    }

    #[test]
    fn test_write_payload_matches_encode() {
        let payload = Payload::from(["write", "me"]);
        let mut sink = Vec::new();
        write_payload(&mut sink, &payload).unwrap();
        assert_eq!(&sink[..], &encode(&payload).unwrap()[..]);
    }

    #[test]
    fn test_write_payload_rejects_empty_frame_without_writing() {
        let mut sink = Vec::new();
        let err = write_payload(&mut sink, &Payload::from([""])).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame { index: 0 }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(&Payload::new()), 4);
        assert_eq!(encoded_len(&Payload::from(["abc"])), 4 + 4 + 4);
    }

    mod properties {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_round_trip(frames in vec(vec(any::<u8>(), 1..64), 0..16)) {
                let payload = Payload::from(frames);
                let bytes = encode(&payload).unwrap();
                prop_assert_eq!(bytes.len(), encoded_len(&payload));
                let decoded = decode(&mut Cursor::new(bytes)).unwrap();
                prop_assert_eq!(decoded, payload);
            }

            #[test]
            fn prop_truncation_never_decodes(
                frames in vec(vec(any::<u8>(), 1..16), 1..8),
                cut in any::<prop::sample::Index>(),
            ) {
                let bytes = encode(&Payload::from(frames)).unwrap();
                let keep = cut.index(bytes.len());
                let result = decode(&mut Cursor::new(bytes.slice(..keep)));
                prop_assert!(result.is_err());
            }
        }
    }
}
