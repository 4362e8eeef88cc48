//! Rolling history of recent audio used to seed newly joined listeners.
//!
//! Without history a listener that joins mid-stream hears nothing until the
//! source's next chunk arrives, and a decoder that needs a few frames of
//! lead-in stays silent for longer.  The buffer keeps the most recent frames
//! up to a byte ceiling.
//!
//! # Retention policy
//!
//! The buffer is append-only.  When appending a frame would push it past the
//! ceiling, the whole buffer is discarded and starts again from that frame.
//! This trades a short re-buffering glitch for a late joiner against O(1)
//! maintenance on the hot broadcast path: there is no per-frame eviction.
//!
//! ```text
//! limit = 10 bytes
//! push 4  → [4]          (4 bytes)
//! push 4  → [4, 4]       (8 bytes)
//! push 4  → [4]          (reset, 4 bytes)
//! ```

use super::frame::AudioFrame;

/// Default byte ceiling: 1 MiB.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024 * 1024;

/// Append-only frame history with wholesale reset at a byte ceiling.
///
/// A limit of `0` disables retention entirely.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    frames: Vec<AudioFrame>,
    bytes: usize,
    limit: usize,
}

impl RollingBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Vec::new(),
            bytes: 0,
            limit,
        }
    }

    /// A buffer that never retains anything.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Byte ceiling this buffer was created with.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Total payload bytes currently retained.  Never exceeds [`limit`](Self::limit).
    pub fn len_bytes(&self) -> usize {
        self.bytes
    }

    /// Number of frames currently retained.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Appends `frame`, resetting the buffer first if it would overflow.
    ///
    /// Returns `true` when the frame was retained.  Empty frames, frames
    /// larger than the ceiling, and every frame of a disabled buffer are not
    /// retained; an oversized frame still resets the buffer because the
    /// history before it no longer leads into the live stream.
    pub fn push(&mut self, frame: &AudioFrame) -> bool {
        if !self.is_enabled() || frame.is_empty() {
            return false;
        }

        if self.bytes + frame.len() > self.limit {
            self.clear();
        }

        if frame.len() > self.limit {
            return false;
        }

        self.bytes += frame.len();
        self.frames.push(frame.clone());
        true
    }

    /// Retained frames, oldest first.
    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    /// Drops every retained frame.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.bytes = 0;
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> AudioFrame {
        AudioFrame::from(vec![0x5A; len])
    }

    #[test]
    fn test_default_limit_is_one_mebibyte() {
        assert_eq!(RollingBuffer::default().limit(), 1024 * 1024);
    }

    #[test]
    fn test_push_retains_frames_in_order() {
        let mut buf = RollingBuffer::new(16);
        let a = AudioFrame::from(vec![1, 2]);
        let b = AudioFrame::from(vec![3]);

        assert!(buf.push(&a));
        assert!(buf.push(&b));

        assert_eq!(buf.frames(), &[a, b]);
        assert_eq!(buf.len_bytes(), 3);
    }

    #[test]
    fn test_overflow_resets_wholesale_then_keeps_new_frame() {
        // Arrange: 8 of 10 bytes used
        let mut buf = RollingBuffer::new(10);
        buf.push(&frame(4));
        buf.push(&frame(4));

        // Act: 4 more would make 12
        let retained = buf.push(&frame(4));

        // Assert: everything older was dropped, not trimmed
        assert!(retained);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.len_bytes(), 4);
    }

    #[test]
    fn test_exactly_filling_the_limit_does_not_reset() {
        let mut buf = RollingBuffer::new(8);
        buf.push(&frame(4));
        buf.push(&frame(4));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.len_bytes(), 8);
    }

    #[test]
    fn test_oversized_frame_clears_and_is_not_retained() {
        let mut buf = RollingBuffer::new(8);
        buf.push(&frame(4));

        assert!(!buf.push(&frame(9)));

        assert!(buf.is_empty());
        assert_eq!(buf.len_bytes(), 0);
    }

    #[test]
    fn test_disabled_buffer_retains_nothing() {
        let mut buf = RollingBuffer::disabled();
        assert!(!buf.is_enabled());
        assert!(!buf.push(&frame(1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut buf = RollingBuffer::new(8);
        assert!(!buf.push(&frame(0)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_len_bytes_never_exceeds_limit() {
        let mut buf = RollingBuffer::new(100);
        for len in [30, 45, 20, 70, 10, 99, 1, 100, 5] {
            buf.push(&frame(len));
            assert!(buf.len_bytes() <= buf.limit(), "after pushing {len} bytes");
        }
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buf = RollingBuffer::new(8);
        buf.push(&frame(3));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.len_bytes(), 0);
    }
}
