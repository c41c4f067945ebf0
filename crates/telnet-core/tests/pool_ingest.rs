//! Integration tests for the slot pool and ingestion policy working together.
//!
//! These tests drive `SlotPool`, `drain_line` and `ReceiveBuffer` through the
//! public API the way the bridge service does on each tick: admit, then drain
//! each slot in index order until a line completes.

use telnet_core::transport::mock::{MockConnection, MockListener, MockNetwork};
use telnet_core::{drain_line, AcceptOutcome, Drain, ListenerFactory, NoYield, ReceiveBuffer, SlotPool};

/// One poll tick as the bridge performs it.
fn tick(pool: &mut SlotPool<MockConnection>, listener: &mut MockListener, rx: &mut ReceiveBuffer) {
    pool.accept_if_pending(listener);
    for index in 0..pool.capacity() {
        if pool.evict_if_stale(index).is_some() {
            continue;
        }
        if let Some(client) = pool.client_mut(index) {
            if drain_line(&mut client.conn, rx, &NoYield) == Drain::LineComplete {
                return;
            }
        }
    }
}

fn drain_all(rx: &mut ReceiveBuffer) -> Vec<u8> {
    std::iter::from_fn(|| rx.read()).collect()
}

#[test]
fn test_split_crlf_stream_yields_lf_only_lines() {
    // Arrange
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(4);
    let mut rx = ReceiveBuffer::new(64);
    let peer = net.connect();

    // Act: "AB\r\nCD" arrives in three fragments across ticks
    let fragments: [&[u8]; 3] = [b"A", b"B\r", b"\nCD"];
    for fragment in fragments {
        peer.send(fragment);
        tick(&mut pool, &mut listener, &mut rx);
    }
    tick(&mut pool, &mut listener, &mut rx);

    // Assert
    assert_eq!(drain_all(&mut rx), b"AB\nCD");
}

#[test]
fn test_connection_accepted_this_tick_is_read_this_tick() {
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(2);
    let mut rx = ReceiveBuffer::new(16);
    let peer = net.connect();
    peer.send(b"$$\n");

    tick(&mut pool, &mut listener, &mut rx);

    assert_eq!(drain_all(&mut rx), b"$$\n");
}

#[test]
fn test_line_from_early_slot_ends_tick_before_later_slots() {
    // Arrange: both clients have a line ready
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(2);
    let mut rx = ReceiveBuffer::new(32);
    let first = net.connect();
    let second = net.connect();
    pool.accept_if_pending(&mut listener);
    pool.accept_if_pending(&mut listener);
    first.send(b"one\n");
    second.send(b"two\n");

    // Act / Assert: one line per tick, lower slot first
    tick(&mut pool, &mut listener, &mut rx);
    assert_eq!(drain_all(&mut rx), b"one\n");
    assert_eq!(second.unread(), 4);

    tick(&mut pool, &mut listener, &mut rx);
    assert_eq!(drain_all(&mut rx), b"two\n");
}

#[test]
fn test_oversized_line_is_deferred_not_dropped() {
    // Arrange: 10 bytes without a newline into an 8-byte ring
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(1);
    let mut rx = ReceiveBuffer::new(8);
    let peer = net.connect();
    peer.send(b"0123456789");

    // Act
    tick(&mut pool, &mut listener, &mut rx);

    // Assert
    assert_eq!(rx.available(), 8);
    assert_eq!(peer.unread(), 2);

    // Controller consumes; the next tick picks up the remainder.
    assert_eq!(drain_all(&mut rx), b"01234567");
    tick(&mut pool, &mut listener, &mut rx);
    assert_eq!(drain_all(&mut rx), b"89");
}

#[test]
fn test_disconnected_slot_is_reused_on_next_admission() {
    // Arrange: fill the only slot, then the peer leaves
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(1);
    let mut rx = ReceiveBuffer::new(8);
    let gone = net.connect();
    tick(&mut pool, &mut listener, &mut rx);
    gone.hang_up();
    let next = net.connect();

    // Act
    let outcome = pool.accept_if_pending(&mut listener);

    // Assert
    assert!(matches!(outcome, AcceptOutcome::Installed { slot: 0, .. }));
    assert!(gone.is_closed());
    assert!(!next.is_closed());
}

#[test]
fn test_n_plus_one_simultaneous_connections() {
    // Arrange
    const N: usize = 4;
    let mut net = MockNetwork::new();
    let mut listener = net.bind(23).expect("bind");
    let mut pool = SlotPool::new(N);
    let mut rx = ReceiveBuffer::new(8);
    let peers: Vec<_> = (0..=N).map(|_| net.connect()).collect();

    // Act
    for _ in 0..=N {
        tick(&mut pool, &mut listener, &mut rx);
    }

    // Assert
    assert_eq!(pool.occupied(), N);
    assert!(peers[..N].iter().all(|p| !p.is_closed()));
    assert!(peers[N].is_closed());

    // The rejected peer never receives broadcast output.
    pool.broadcast(b"hi", &NoYield);
    assert!(peers[N].written().is_empty());
    assert!(peers[..N].iter().all(|p| p.written() == b"hi"));
}
