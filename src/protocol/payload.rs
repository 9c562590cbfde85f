//! Multi-frame payload type.
//!
//! A [`Payload`] is an ordered list of frames. Frames are `bytes::Bytes`, so
//! cloning a payload or handing frames to a handler never copies content.
//!
//! # Example
//!
//! ```
//! use unix_mailbox::protocol::Payload;
//!
//! let payload = Payload::from(["This", "is", "a", "test"]);
//! assert_eq!(payload.len(), 4);
//! assert_eq!(payload.frame_str(3), Some("test"));
//! ```

use bytes::Bytes;

/// Ordered sequence of frames forming one request or one reply.
///
/// Frames must be non-empty to go on the wire; [`encode`](super::encode)
/// rejects an empty one. A payload with zero frames is valid and is what a
/// handler returns when it has nothing to send back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload {
    frames: Vec<Bytes>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Create an empty payload with room for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Append a frame.
    pub fn push(&mut self, frame: impl Into<Bytes>) {
        self.frames.push(frame.into());
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when there are no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.frames.get(index)
    }

    /// Frame at `index` as UTF-8 text, if present and valid.
    pub fn frame_str(&self, index: usize) -> Option<&str> {
        self.get(index)
            .and_then(|frame| std::str::from_utf8(frame).ok())
    }

    /// All frames in order.
    #[inline]
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Iterate over frames in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.frames.iter()
    }

    /// Consume the payload and return its frames.
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames
    }
}

impl<T: Into<Bytes>> From<Vec<T>> for Payload {
    fn from(frames: Vec<T>) -> Self {
        frames.into_iter().collect()
    }
}

impl<T: Into<Bytes>, const N: usize> From<[T; N]> for Payload {
    fn from(frames: [T; N]) -> Self {
        frames.into_iter().collect()
    }
}

impl<T: Into<Bytes>> FromIterator<T> for Payload {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<T: Into<Bytes>> Extend<T> for Payload {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.frames.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for Payload {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = &'a Bytes;
    type IntoIter = std::slice::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
