//! In-memory transport for tests.
//!
//! [`MockNetwork`] plays both the listener factory and the remote side of
//! the network.  Tests call [`MockNetwork::connect`] to queue an inbound
//! connection and keep the returned [`MockPeer`] to send bytes, hang up, or
//! inspect what the bridge wrote, even after the connection itself has been
//! moved into a slot.

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use super::{Connection, Listener, ListenerFactory};

#[derive(Debug, Default)]
struct PeerState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    hung_up: bool,
    closed: bool,
    fail_writes: bool,
    reads: usize,
}

/// Bridge-side end of an in-memory connection.
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<PeerState>>,
    peer: SocketAddr,
}

/// Test-side end of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MockPeer {
    state: Arc<Mutex<PeerState>>,
    addr: SocketAddr,
}

/// Creates a connected pair with a synthetic loopback peer address.
pub fn pair(peer_port: u16) -> (MockConnection, MockPeer) {
    let state = Arc::new(Mutex::new(PeerState::default()));
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer_port);
    (
        MockConnection {
            state: Arc::clone(&state),
            peer: addr,
        },
        MockPeer { state, addr },
    )
}

impl MockPeer {
    /// Queues bytes for the bridge to read.
    pub fn send(&self, data: &[u8]) {
        self.state
            .lock()
            .expect("lock poisoned")
            .inbound
            .extend(data.iter().copied());
    }

    /// Simulates the remote side closing the socket.
    pub fn hang_up(&self) {
        self.state.lock().expect("lock poisoned").hung_up = true;
    }

    /// Makes every subsequent write from the bridge fail.
    pub fn fail_writes(&self) {
        self.state.lock().expect("lock poisoned").fail_writes = true;
    }

    /// Everything the bridge has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().expect("lock poisoned").written.clone()
    }

    /// `true` once the bridge has closed its end.
    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("lock poisoned").closed
    }

    /// Bytes sent but not yet read by the bridge.
    pub fn unread(&self) -> usize {
        self.state.lock().expect("lock poisoned").inbound.len()
    }

    /// Number of successful `read_byte` calls the bridge has made.
    pub fn reads(&self) -> usize {
        self.state.lock().expect("lock poisoned").reads
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Connection for MockConnection {
    fn is_connected(&mut self) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        !state.closed && (!state.hung_up || !state.inbound.is_empty())
    }

    fn bytes_available(&mut self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        if state.closed {
            0
        } else {
            state.inbound.len()
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.closed {
            return None;
        }
        let byte = state.inbound.pop_front();
        if byte.is_some() {
            state.reads += 1;
        }
        byte
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.closed || state.hung_up || state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        state.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self) {
        self.state.lock().expect("lock poisoned").closed = true;
    }

    fn peer(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

#[derive(Debug, Default)]
struct NetworkState {
    queue: VecDeque<MockConnection>,
    bound_port: Option<u16>,
    no_delay: bool,
    refuse_bind: bool,
    bind_count: usize,
    next_peer_port: u16,
}

/// Shared in-memory network: a [`ListenerFactory`] plus test controls.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an inbound connection and returns its test-side handle.
    pub fn connect(&self) -> MockPeer {
        let mut state = self.inner.lock().expect("lock poisoned");
        state.next_peer_port = state.next_peer_port.wrapping_add(1);
        let (conn, peer) = pair(40_000 + state.next_peer_port);
        state.queue.push_back(conn);
        peer
    }

    /// Makes every subsequent `bind` fail with `AddrInUse`.
    pub fn refuse_bind(&self) {
        self.inner.lock().expect("lock poisoned").refuse_bind = true;
    }

    /// Number of successful binds.
    pub fn bind_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").bind_count
    }

    /// Port of the live listener; `None` once it has been dropped.
    pub fn bound_port(&self) -> Option<u16> {
        self.inner.lock().expect("lock poisoned").bound_port
    }

    /// Last value passed to `set_no_delay`.
    pub fn no_delay(&self) -> bool {
        self.inner.lock().expect("lock poisoned").no_delay
    }

    /// Inbound connections not yet accepted.
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("lock poisoned").queue.len()
    }
}

impl ListenerFactory for MockNetwork {
    type Listener = MockListener;

    fn bind(&mut self, port: u16) -> io::Result<MockListener> {
        let mut state = self.inner.lock().expect("lock poisoned");
        if state.refuse_bind {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "port in use"));
        }
        state.bound_port = Some(port);
        state.bind_count += 1;
        Ok(MockListener {
            net: self.clone(),
        })
    }
}

/// Listener handed out by [`MockNetwork`].
#[derive(Debug)]
pub struct MockListener {
    net: MockNetwork,
}

impl Listener for MockListener {
    type Conn = MockConnection;

    fn has_pending(&mut self) -> bool {
        !self.net.inner.lock().expect("lock poisoned").queue.is_empty()
    }

    fn accept(&mut self) -> Option<MockConnection> {
        self.net.inner.lock().expect("lock poisoned").queue.pop_front()
    }

    fn set_no_delay(&mut self, enabled: bool) {
        self.net.inner.lock().expect("lock poisoned").no_delay = enabled;
    }

    fn local_port(&self) -> Option<u16> {
        self.net.bound_port()
    }
}

impl Drop for MockListener {
    fn drop(&mut self) {
        if let Ok(mut state) = self.net.inner.lock() {
            state.bound_port = None;
        }
    }
}
