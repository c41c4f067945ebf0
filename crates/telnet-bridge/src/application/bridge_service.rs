//! The bridge service: lifecycle, poll tick, and broadcast.
//!
//! [`BridgeService`] is a plain `&mut self` state machine driven by the
//! controller's main loop.  Nothing in here blocks or spawns; every socket
//! operation is a non-blocking poll through the `telnet-core` capability
//! traits.
//!
//! # States
//!
//! ```text
//!            start() [enabled]             stop()
//!  Stopped ───────────────────▶ Listening ────────▶ Stopped
//!     │
//!     └── start() [disabled] ──▶ Stopped (inert)
//! ```
//!
//! # One tick
//!
//! 1. Not listening → return.
//! 2. Admit at most one pending connection (evicting the stale slot it lands
//!    on, or rejecting when all N slots are busy).
//! 3. Visit slots in index order.  Stale handles are closed and cleared.
//!    Connected handles are drained into the receive ring; the first `\n`
//!    ends the whole tick, so each tick delivers at most one line.

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use telnet_core::{
    drain_line, AcceptOutcome, Drain, Listener, ListenerFactory, ReceiveBuffer, Scheduler,
    SessionId, SlotPool, ThreadYield,
};

use crate::domain::settings::{ConfigError, SettingsStore};

/// Capacity of the controller event channel.  Events beyond it are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── Error and outcome types ───────────────────────────────────────────────────

/// Reasons `start()` can fail.
///
/// Everything that happens after a successful start (full buffers, rejected
/// or vanished clients, failed writes) degrades to dropped data and is not an
/// error.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Settings could not be loaded or failed validation.
    #[error("failed to load bridge settings: {0}")]
    Settings(#[from] ConfigError),

    /// The listener could not be bound.
    #[error("failed to bind telnet listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Successful result of [`BridgeService::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The listener is bound and ticks will accept clients.
    Listening { port: u16 },
    /// Settings have the service switched off; nothing was created.
    Disabled,
}

/// Snapshot of the service's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceState {
    pub enabled: bool,
    pub port: u16,
    pub listening: bool,
}

/// Notifications for the controller's message channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Started {
        port: u16,
    },
    Stopped,
    ClientConnected {
        slot: usize,
        session: SessionId,
        peer: Option<SocketAddr>,
    },
    ClientRejected {
        peer: Option<SocketAddr>,
    },
    ClientEvicted {
        slot: usize,
        session: SessionId,
    },
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::Started { port } => write!(f, "[MSG:TELNET Started {port}]"),
            BridgeEvent::Stopped => write!(f, "[MSG:TELNET Stopped]"),
            BridgeEvent::ClientConnected { slot, peer, .. } => match peer {
                Some(peer) => write!(f, "[MSG:TELNET client {slot} connected from {peer}]"),
                None => write!(f, "[MSG:TELNET client {slot} connected]"),
            },
            BridgeEvent::ClientRejected { .. } => write!(f, "[MSG:TELNET client rejected, no free slot]"),
            BridgeEvent::ClientEvicted { slot, .. } => write!(f, "[MSG:TELNET client {slot} disconnected]"),
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Everything that exists only while listening.
struct Session<L: Listener> {
    listener: L,
    slots: SlotPool<L::Conn>,
    rx: ReceiveBuffer,
}

/// Multi-client TCP text bridge.
///
/// - `F` creates the listener on `start()`.
/// - `S` supplies the enable flag, port, and sizing.
/// - `Y` is the cooperative yield point used inside bounded loops.
pub struct BridgeService<F, S, Y = ThreadYield>
where
    F: ListenerFactory,
{
    factory: F,
    store: S,
    scheduler: Y,
    state: ServiceState,
    session: Option<Session<F::Listener>>,
    events: mpsc::Sender<BridgeEvent>,
}

impl<F, S, Y> BridgeService<F, S, Y>
where
    F: ListenerFactory,
    S: SettingsStore,
    Y: Scheduler,
{
    /// Creates a stopped service together with the receiver for its
    /// [`BridgeEvent`]s.
    pub fn new(factory: F, store: S, scheduler: Y) -> (Self, mpsc::Receiver<BridgeEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let service = Self {
            factory,
            store,
            scheduler,
            state: ServiceState::default(),
            session: None,
            events: tx,
        };
        (service, rx)
    }

    /// Reads settings and, when enabled, starts listening.
    ///
    /// Calling `start()` while already listening changes nothing and reports
    /// the current port.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Settings`] if the settings cannot be loaded or are
    ///   invalid.
    /// - [`BridgeError::Bind`] if the listener cannot be bound.
    ///
    /// In both cases the service stays stopped.
    pub fn start(&mut self) -> Result<StartOutcome, BridgeError> {
        if self.session.is_some() {
            return Ok(StartOutcome::Listening {
                port: self.state.port,
            });
        }

        let settings = self.store.load()?;
        settings.validate()?;
        self.state.enabled = settings.enabled;
        self.state.port = settings.port;

        if !settings.enabled {
            info!("TELNET disabled by settings");
            return Ok(StartOutcome::Disabled);
        }

        let mut listener = self
            .factory
            .bind(settings.port)
            .map_err(|source| BridgeError::Bind {
                port: settings.port,
                source,
            })?;
        listener.set_no_delay(settings.no_delay);
        // Port 0 asks the OS to choose; report what it chose.
        let port = listener.local_port().unwrap_or(settings.port);

        self.session = Some(Session {
            listener,
            slots: SlotPool::new(settings.max_clients),
            rx: ReceiveBuffer::new(settings.rx_buffer_size),
        });
        self.state.port = port;
        self.state.listening = true;

        let event = BridgeEvent::Started { port };
        info!(
            max_clients = settings.max_clients,
            rx_buffer_size = settings.rx_buffer_size,
            "{event}"
        );
        emit(&self.events, event);
        Ok(StartOutcome::Listening { port })
    }

    /// [`start`](Self::start) reduced to "is it listening now?".
    ///
    /// Failures are logged.
    pub fn begin(&mut self) -> bool {
        match self.start() {
            Ok(StartOutcome::Listening { .. }) => true,
            Ok(StartOutcome::Disabled) => false,
            Err(e) => {
                warn!("TELNET start failed: {e}");
                false
            }
        }
    }

    /// Drives one poll tick.
    pub fn handle(&mut self) {
        let Self {
            session,
            events,
            scheduler,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };

        admit(session, events);

        for index in 0..session.slots.capacity() {
            if let Some(evicted) = session.slots.evict_if_stale(index) {
                emit(
                    events,
                    BridgeEvent::ClientEvicted {
                        slot: index,
                        session: evicted,
                    },
                );
            } else if let Some(client) = session.slots.client_mut(index) {
                if drain_line(&mut client.conn, &mut session.rx, &*scheduler) == Drain::LineComplete {
                    trace!(slot = index, available = session.rx.available(), "line complete");
                    return;
                }
            }
            scheduler.yield_now();
        }
    }

    /// Broadcasts `data` to every connected client.
    ///
    /// Returns `data.len()` when listening (regardless of how many clients
    /// actually took the bytes) and `0` without touching any socket when not.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let Self {
            session,
            events,
            scheduler,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            debug!("TELNET out blocked: not listening");
            return 0;
        };

        admit(session, events);
        let delivered = session.slots.broadcast(data, &*scheduler);
        trace!(len = data.len(), delivered, "TELNET out");
        data.len()
    }
}

impl<F, S, Y> BridgeService<F, S, Y>
where
    F: ListenerFactory,
{
    /// Closes the listener and every client and empties the receive ring.
    ///
    /// Does nothing when not listening.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let closed = session.slots.close_all();
        session.rx.clear();
        drop(session);

        self.state.listening = false;
        info!(port = self.state.port, closed, "{}", BridgeEvent::Stopped);
        emit(&self.events, BridgeEvent::Stopped);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state.listening
    }

    /// Bytes waiting in the receive ring.
    pub fn available(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.rx.available())
    }

    /// Oldest buffered byte, left in place.
    pub fn peek(&self) -> Option<u8> {
        self.session.as_ref()?.rx.peek()
    }

    /// Removes and returns the oldest buffered byte.
    pub fn read(&mut self) -> Option<u8> {
        self.session.as_mut()?.rx.read()
    }

    /// Removes the oldest complete line, without its line feed.
    pub fn read_line(&mut self) -> Option<Vec<u8>> {
        let session = self.session.as_mut()?;
        let mut line = Vec::new();
        session.rx.take_line(&mut line).then_some(line)
    }

    /// Pushes controller-originated bytes into the receive ring as one batch.
    ///
    /// Returns `false` with nothing written when not listening or when the
    /// batch does not fit.
    pub fn inject(&mut self, data: &[u8]) -> bool {
        match self.session.as_mut() {
            Some(session) => session.rx.push_slice(data),
            None => false,
        }
    }

    /// Number of occupied client slots.
    pub fn connected_clients(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.slots.occupied())
    }

    /// Port the listener is bound to, while listening.
    pub fn local_port(&self) -> Option<u16> {
        self.session.as_ref()?.listener.local_port()
    }
}

impl<F, S, Y> Drop for BridgeService<F, S, Y>
where
    F: ListenerFactory,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one admission pass and reports what happened.
fn admit<L: Listener>(session: &mut Session<L>, events: &mpsc::Sender<BridgeEvent>) {
    match session.slots.accept_if_pending(&mut session.listener) {
        AcceptOutcome::Idle => {}
        AcceptOutcome::Installed {
            slot,
            session: id,
            peer,
            replaced,
        } => {
            if let Some(old) = replaced {
                emit(events, BridgeEvent::ClientEvicted { slot, session: old });
            }
            emit(
                events,
                BridgeEvent::ClientConnected {
                    slot,
                    session: id,
                    peer,
                },
            );
        }
        AcceptOutcome::Rejected { peer } => {
            emit(events, BridgeEvent::ClientRejected { peer });
        }
    }
}

fn emit(events: &mpsc::Sender<BridgeEvent>, event: BridgeEvent) {
    if let Err(e) = events.try_send(event) {
        trace!("bridge event not delivered: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
