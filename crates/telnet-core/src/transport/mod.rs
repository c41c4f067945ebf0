//! Capability traits for the network and the host scheduler.
//!
//! The bridge never touches a socket type directly.  It talks to a
//! [`Listener`] produced by a [`ListenerFactory`] and to the [`Connection`]
//! handles the listener hands out.  Every method is a non-blocking poll:
//! availability is checked before reading, and nothing waits on the network.
//!
//! # Testability
//!
//! Production adapters live in `telnet-bridge` (std TCP sockets); tests use
//! the in-memory [`mock`] transport.

use std::io;
use std::net::SocketAddr;

pub mod mock;

/// One accepted client connection.
///
/// The handle is owned exclusively by the slot it is installed in and is
/// closed when the slot is evicted or the service stops.
pub trait Connection {
    /// `true` while the peer is connected or unread bytes remain.
    fn is_connected(&mut self) -> bool;

    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> usize;

    /// Reads one byte, or `None` when nothing is available.
    fn read_byte(&mut self) -> Option<u8>;

    /// Writes `data` to the peer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the peer cannot take the bytes.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Closes the connection.  Calling it twice is harmless.
    fn close(&mut self);

    /// Remote address, when the transport knows it.
    fn peer(&self) -> Option<SocketAddr> {
        None
    }
}

/// A bound, listening endpoint.
pub trait Listener {
    type Conn: Connection;

    /// `true` when an inbound connection is waiting to be accepted.
    fn has_pending(&mut self) -> bool;

    /// Accepts the pending connection, if any.
    fn accept(&mut self) -> Option<Self::Conn>;

    /// Enables or disables packet coalescing (Nagle) on accepted connections.
    fn set_no_delay(&mut self, enabled: bool);

    /// Port the listener is actually bound to.
    fn local_port(&self) -> Option<u16> {
        None
    }
}

/// Creates listeners on demand; called once per successful `start()`.
pub trait ListenerFactory {
    type Listener: Listener;

    /// Binds a listener on `port`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the port cannot be bound.
    fn bind(&mut self, port: u16) -> io::Result<Self::Listener>;
}

/// Cooperative yield point.
///
/// The bridge shares its thread with other periodic duties (watchdogs, other
/// I/O services).  Loops bounded by buffer capacity or client count call
/// [`Scheduler::yield_now`] so those duties keep running.  A yield never
/// re-enters the bridge.
#[cfg_attr(test, mockall::automock)]
pub trait Scheduler {
    fn yield_now(&self);
}

/// Yields the current OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadYield;

impl Scheduler for ThreadYield {
    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Never yields.  Suitable when nothing else shares the thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYield;

impl Scheduler for NoYield {
    fn yield_now(&self) {}
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn yield_now(&self) {
        (**self).yield_now();
    }
}
