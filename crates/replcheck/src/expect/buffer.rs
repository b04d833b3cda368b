//! Session output buffer.
//!
//! Bytes read from the program accumulate here until an expectation
//! consumes them. Consumed bytes are dropped, so the buffer only ever holds
//! output that no wait has claimed yet. [`OutputBuffer::offset`] keeps the
//! absolute position of the first held byte.

use std::fmt;

/// Default limit on unconsumed output (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Unconsumed program output with a read cursor.
#[derive(Clone)]
pub struct OutputBuffer {
    data: Vec<u8>,
    /// Absolute offset of `data[0]` in the session's output stream.
    offset: usize,
    max_size: usize,
    total_received: usize,
    bytes_discarded: usize,
}

impl OutputBuffer {
    /// Create a buffer holding at most `max_size` unconsumed bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(max_size.min(64 * 1024)),
            offset: 0,
            max_size: max_size.max(1),
            total_received: 0,
            bytes_discarded: 0,
        }
    }

    /// Append output read from the program.
    ///
    /// When unconsumed output would exceed the limit the oldest bytes are
    /// discarded.
    pub fn append(&mut self, bytes: &[u8]) {
        self.total_received += bytes.len();
        self.data.extend_from_slice(bytes);

        let excess = self.data.len().saturating_sub(self.max_size);
        if excess > 0 {
            self.data.drain(..excess);
            self.offset += excess;
            self.bytes_discarded += excess;
            tracing::warn!(
                discarded = excess,
                max_size = self.max_size,
                "output buffer full, dropped oldest unconsumed bytes"
            );
        }
    }

    /// Get the unconsumed bytes.
    #[must_use]
    pub fn unconsumed(&self) -> &[u8] {
        &self.data
    }

    /// Get the unconsumed bytes as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn as_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Absolute stream offset of the first unconsumed byte.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Advance the cursor by `n` bytes, returning what was consumed.
    pub fn consume(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.data.len());
        self.offset += n;
        self.data.drain(..n).collect()
    }

    /// Consume everything currently held.
    pub fn clear(&mut self) -> Vec<u8> {
        self.consume(self.data.len())
    }

    /// Get the number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if there is no unconsumed output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the limit on unconsumed output.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the total bytes ever appended.
    #[must_use]
    pub const fn total_received(&self) -> usize {
        self.total_received
    }

    /// Get the number of bytes dropped because the buffer was full.
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.data.len())
            .field("offset", &self.offset)
            .field("max_size", &self.max_size)
            .field("total_received", &self.total_received)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_advances_offset() {
        let mut buf = OutputBuffer::new(64);
        buf.append(b"hello world");
        assert_eq!(buf.consume(6), b"hello ");
        assert_eq!(buf.offset(), 6);
        assert_eq!(buf.unconsumed(), b"world");
        assert_eq!(buf.total_received(), 11);
    }

    #[test]
    fn consume_past_end_is_clamped() {
        let mut buf = OutputBuffer::new(64);
        buf.append(b"abc");
        assert_eq!(buf.consume(10), b"abc");
        assert!(buf.is_empty());
        assert_eq!(buf.offset(), 3);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = OutputBuffer::new(4);
        buf.append(b"abcdef");
        assert_eq!(buf.unconsumed(), b"cdef");
        assert_eq!(buf.offset(), 2);
        assert_eq!(buf.bytes_discarded(), 2);

        buf.append(b"gh");
        assert_eq!(buf.unconsumed(), b"efgh");
        assert_eq!(buf.offset(), 4);
    }

    #[test]
    fn lossy_view_replaces_invalid_utf8() {
        let mut buf = OutputBuffer::new(16);
        buf.append(b"ok\xff");
        assert_eq!(buf.as_str_lossy(), "ok\u{fffd}");
    }
}
