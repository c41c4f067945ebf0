//! Fixed-capacity circular receive buffer.
//!
//! Every connected client feeds the same ring; the controller drains it one
//! byte (or one line) at a time.  Storage is allocated once when the buffer
//! is created and never grows, so the controller-visible backlog has a hard
//! cap of [`ReceiveBuffer::capacity`] bytes.
//!
//! # Layout
//!
//! ```text
//!  storage: [ . . C D E . . . A B ]
//!                  ▲           ▲
//!                  │           head (oldest byte, next to read)
//!                  tail = (head + len) mod capacity
//! ```
//!
//! Bytes are logically ordered oldest-first starting at `head`, wrapping at
//! the end of the storage slice.

use tracing::trace;

/// Line terminator recognised by [`ReceiveBuffer::take_line`].
pub const LINE_FEED: u8 = b'\n';

/// A bounded FIFO of bytes backed by a ring.
///
/// Invariants: `len <= capacity`, and `head < capacity` whenever the
/// capacity is non-zero.
#[derive(Debug, Clone)]
pub struct ReceiveBuffer {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ReceiveBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    ///
    /// A zero-capacity buffer is permitted; it rejects every push.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use telnet_core::ReceiveBuffer;
    ///
    /// let mut rx = ReceiveBuffer::new(4);
    /// assert!(rx.push(b'G'));
    /// assert_eq!(rx.peek(), Some(b'G'));
    /// assert_eq!(rx.read(), Some(b'G'));
    /// assert_eq!(rx.read(), None);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of bytes the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of buffered bytes.
    pub fn available(&self) -> usize {
        self.len
    }

    /// Remaining room before pushes start failing.
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends one byte.
    ///
    /// Returns `false` and leaves the buffer untouched when it is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % self.capacity();
        self.storage[tail] = byte;
        self.len += 1;
        trace!(byte, len = self.len, "rx push");
        true
    }

    /// Appends a whole batch, or nothing.
    ///
    /// Returns `false` without writing a single byte when `data` does not fit
    /// in the remaining room.
    pub fn push_slice(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free() {
            return false;
        }
        if data.is_empty() {
            return true;
        }

        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;
        // At most two contiguous runs: up to the end of storage, then from 0.
        let first = data.len().min(capacity - tail);
        self.storage[tail..tail + first].copy_from_slice(&data[..first]);
        self.storage[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
        trace!(count = data.len(), len = self.len, "rx push batch");
        true
    }

    /// Returns the oldest byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.head])
        }
    }

    /// Removes and returns the oldest byte.
    pub fn read(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.storage[self.head];
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        trace!(byte, len = self.len, "rx read");
        Some(byte)
    }

    /// Moves the oldest complete line into `out`.
    ///
    /// The line feed is consumed but not copied.  Returns `false` and leaves
    /// both the buffer and `out` untouched when no line feed is buffered yet.
    pub fn take_line(&mut self, out: &mut Vec<u8>) -> bool {
        let Some(end) = self.iter().position(|b| b == LINE_FEED) else {
            return false;
        };

        out.clear();
        out.reserve(end);
        for _ in 0..end {
            // `end` bytes precede the line feed, so these reads cannot fail.
            if let Some(byte) = self.read() {
                out.push(byte);
            }
        }
        self.read();
        true
    }

    /// Drops every buffered byte and rewinds the ring.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterates buffered bytes oldest-first without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.storage[(self.head + i) % capacity])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
