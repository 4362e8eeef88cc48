//! The opaque audio payload forwarded from the source to every listener.

use bytes::Bytes;

/// One chunk of the source's raw stream.
///
/// The relay never interprets the payload (sample rate, codec, and framing
/// are the source's business).  Cloning is cheap: the inner [`Bytes`] is
/// reference counted, so fanning one frame out to a thousand listeners shares
/// a single allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Bytes,
}

impl AudioFrame {
    /// Wraps an already reference-counted buffer.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Hands back the shared buffer without copying.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Vec<u8>> for AudioFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl From<Bytes> for AudioFrame {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for AudioFrame {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}
