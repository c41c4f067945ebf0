//! Non-blocking std TCP adapters for the `telnet-core` transport traits.
//!
//! The bridge polls; it never waits.  The listener and every accepted stream
//! are switched to non-blocking mode, and a `WouldBlock` result is treated as
//! "nothing right now" rather than an error.
//!
//! Reads are buffered: one `read()` syscall fills a small inbox and the
//! per-byte `read_byte` calls the ingest loop makes are served from it.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, warn};

use telnet_core::{Connection, Listener, ListenerFactory};

/// Upper bound on bytes pulled from a socket per `read()` call.
const READ_CHUNK: usize = 256;

fn is_would_block(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Binds [`StdTcpListener`]s on a fixed local address.
#[derive(Debug, Clone, Copy)]
pub struct StdTcpListenerFactory {
    bind_ip: IpAddr,
}

impl StdTcpListenerFactory {
    pub fn new(bind_ip: IpAddr) -> Self {
        Self { bind_ip }
    }
}

impl Default for StdTcpListenerFactory {
    /// Listens on all IPv4 interfaces.
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl ListenerFactory for StdTcpListenerFactory {
    type Listener = StdTcpListener;

    fn bind(&mut self, port: u16) -> io::Result<StdTcpListener> {
        let addr = SocketAddr::new(self.bind_ip, port);
        let inner = TcpListener::bind(addr)?;
        inner.set_nonblocking(true)?;
        info!("TCP listener bound on {}", inner.local_addr()?);
        Ok(StdTcpListener {
            inner,
            pending: None,
            no_delay: false,
        })
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// A non-blocking listening socket.
///
/// `has_pending` has to call `accept()` to find out, so a connection found
/// that way is parked until the next `accept`.
#[derive(Debug)]
pub struct StdTcpListener {
    inner: TcpListener,
    pending: Option<(TcpStream, SocketAddr)>,
    no_delay: bool,
}

impl StdTcpListener {
    fn poll_accept(&mut self) -> Option<(TcpStream, SocketAddr)> {
        match self.inner.accept() {
            Ok(pair) => Some(pair),
            Err(e) if is_would_block(&e) => None,
            Err(e) => {
                warn!("accept failed: {e}");
                None
            }
        }
    }
}

impl Listener for StdTcpListener {
    type Conn = StdTcpConnection;

    fn has_pending(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.poll_accept();
        }
        self.pending.is_some()
    }

    fn accept(&mut self) -> Option<StdTcpConnection> {
        let (stream, peer) = match self.pending.take() {
            Some(pair) => pair,
            None => self.poll_accept()?,
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, "dropping connection, cannot make it non-blocking: {e}");
            return None;
        }
        if let Err(e) = stream.set_nodelay(self.no_delay) {
            debug!(%peer, "set_nodelay failed: {e}");
        }
        Some(StdTcpConnection::new(stream, peer))
    }

    fn set_no_delay(&mut self, enabled: bool) {
        self.no_delay = enabled;
    }

    fn local_port(&self) -> Option<u16> {
        self.inner.local_addr().ok().map(|addr| addr.port())
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// One accepted, non-blocking client stream.
#[derive(Debug)]
pub struct StdTcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
    inbox: VecDeque<u8>,
    peer_closed: bool,
    closed: bool,
}

impl StdTcpConnection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            inbox: VecDeque::with_capacity(READ_CHUNK),
            peer_closed: false,
            closed: false,
        }
    }

    /// Pulls whatever the socket has into the inbox, once.
    fn fill(&mut self) {
        if self.closed || self.peer_closed {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(0) => self.peer_closed = true,
            Ok(n) => self.inbox.extend(&chunk[..n]),
            Err(e) if is_would_block(&e) || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!(peer = %self.peer, "read failed: {e}");
                self.peer_closed = true;
            }
        }
    }
}

impl Connection for StdTcpConnection {
    fn is_connected(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.inbox.is_empty() {
            self.fill();
        }
        !self.peer_closed || !self.inbox.is_empty()
    }

    fn bytes_available(&mut self) -> usize {
        if self.inbox.is_empty() {
            self.fill();
        }
        self.inbox.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.inbox.is_empty() {
            self.fill();
        }
        self.inbox.pop_front()
    }

    /// Writes as much of `data` as the socket takes without blocking.
    ///
    /// A full send buffer ends the write early with `Ok(partial)`; the rest
    /// of `data` is dropped for this client.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_would_block(&e) => {
                    debug!(peer = %self.peer, written, len = data.len(), "send buffer full; output truncated");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbox.clear();
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(peer = %self.peer, "shutdown: {e}");
        }
    }

    fn peer(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
