//! Line ingestion policy: how bytes move from one client into the ring.
//!
//! Bytes are consumed one at a time while the client has data and the ring
//! has room:
//!
//! | Byte   | Action                                       |
//! |--------|----------------------------------------------|
//! | `\r`   | dropped                                      |
//! | `\n`   | pushed, then the caller ends the whole tick  |
//! | other  | pushed as-is                                 |
//!
//! A full ring stops the drain without reading further, so the remaining
//! bytes stay in the client's socket for a later tick instead of being lost.

use crate::buffer::{ReceiveBuffer, LINE_FEED};
use crate::transport::{Connection, Scheduler};

/// Carriage return, stripped on ingestion.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Why [`drain_line`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The client had nothing more to read.
    Exhausted,
    /// A line feed was pushed; the tick must end here.
    LineComplete,
    /// The ring is full; unread bytes stay with the client.
    BufferFull,
}

/// Moves bytes from `conn` into `rx` until a line ends, the client runs dry,
/// or the ring fills.  Yields to `scheduler` once per byte read.
pub fn drain_line<C, Y>(conn: &mut C, rx: &mut ReceiveBuffer, scheduler: &Y) -> Drain
where
    C: Connection + ?Sized,
    Y: Scheduler + ?Sized,
{
    loop {
        if rx.is_full() {
            return Drain::BufferFull;
        }
        if conn.bytes_available() == 0 {
            return Drain::Exhausted;
        }
        scheduler.yield_now();
        let Some(byte) = conn.read_byte() else {
            return Drain::Exhausted;
        };
        match byte {
            CARRIAGE_RETURN => {}
            LINE_FEED => {
                rx.push(byte);
                return Drain::LineComplete;
            }
            other => {
                rx.push(other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::pair;
    use crate::transport::{MockScheduler, NoYield};

    #[test]
    fn test_drain_strips_carriage_return_and_stops_at_line_feed() {
        // Arrange
        let (mut conn, peer) = pair(1);
        peer.send(b"G0\r\nG1\r\n");
        let mut rx = ReceiveBuffer::new(16);

        // Act
        let outcome = drain_line(&mut conn, &mut rx, &NoYield);

        // Assert: only the first line was consumed
        assert_eq!(outcome, Drain::LineComplete);
        assert_eq!(rx.iter().collect::<Vec<_>>(), b"G0\n");
        assert_eq!(peer.unread(), 4);
    }

    #[test]
    fn test_drain_without_line_feed_exhausts_client() {
        let (mut conn, peer) = pair(1);
        peer.send(b"?");
        let mut rx = ReceiveBuffer::new(4);

        assert_eq!(drain_line(&mut conn, &mut rx, &NoYield), Drain::Exhausted);
        assert_eq!(rx.read(), Some(b'?'));
    }

    #[test]
    fn test_drain_stops_when_buffer_full_and_defers_rest() {
        // Arrange: 6 bytes for a 4-byte ring
        let (mut conn, peer) = pair(1);
        peer.send(b"abcdef");
        let mut rx = ReceiveBuffer::new(4);

        // Act
        let outcome = drain_line(&mut conn, &mut rx, &NoYield);

        // Assert: exactly capacity bytes buffered, the rest still unread
        assert_eq!(outcome, Drain::BufferFull);
        assert_eq!(rx.available(), 4);
        assert_eq!(peer.unread(), 2);
    }

    #[test]
    fn test_drain_into_full_buffer_reads_nothing() {
        let (mut conn, peer) = pair(1);
        peer.send(b"x");
        let mut rx = ReceiveBuffer::new(1);
        rx.push(b'y');

        assert_eq!(drain_line(&mut conn, &mut rx, &NoYield), Drain::BufferFull);
        assert_eq!(peer.reads(), 0);
    }

    #[test]
    fn test_carriage_returns_do_not_consume_capacity() {
        let (mut conn, peer) = pair(1);
        peer.send(b"\r\r\ra");
        let mut rx = ReceiveBuffer::new(1);

        assert_eq!(drain_line(&mut conn, &mut rx, &NoYield), Drain::BufferFull);
        assert_eq!(rx.read(), Some(b'a'));
    }

    #[test]
    fn test_drain_yields_once_per_byte_read() {
        // Arrange
        let (mut conn, peer) = pair(1);
        peer.send(b"ab\r\n");
        let mut rx = ReceiveBuffer::new(8);
        let mut scheduler = MockScheduler::new();
        scheduler.expect_yield_now().times(4).return_const(());

        // Act
        let outcome = drain_line(&mut conn, &mut rx, &scheduler);

        // Assert
        assert_eq!(outcome, Drain::LineComplete);
    }
}
