//! Fixed-size client slot pool.
//!
//! The pool owns up to N client connections.  A slot is either empty or holds
//! one [`Client`]; a slot's index is its identity for the life of the
//! connection.
//!
//! # Admission and eviction
//!
//! - Admission happens in [`SlotPool::accept_if_pending`]: one pass finds the
//!   first slot that is empty *or* holds a handle that has stopped reporting
//!   connected.  A stale handle found this way is closed before the new one is
//!   installed.  When no slot qualifies the new connection is accepted and
//!   closed at once, so the listener never backs up and the pool never grows.
//! - Eviction is lazy.  A disconnected handle is closed and cleared only when
//!   the pool is about to use or replace its slot; there is no background
//!   sweep.

use std::net::SocketAddr;

use tracing::{debug, info};
use uuid::Uuid;

use crate::transport::{Connection, Listener, Scheduler};

/// Identifier attached to each accepted connection for log correlation.
pub type SessionId = Uuid;

/// A connection installed in a slot.
#[derive(Debug)]
pub struct Client<C> {
    pub session: SessionId,
    pub conn: C,
}

/// Result of one admission pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// No connection was waiting.
    Idle,
    /// The pending connection now lives in `slot`.
    Installed {
        slot: usize,
        session: SessionId,
        peer: Option<SocketAddr>,
        /// Session of the stale client closed to make room, if any.
        replaced: Option<SessionId>,
    },
    /// Every slot was busy; the connection was accepted and closed.
    Rejected { peer: Option<SocketAddr> },
}

/// N optional client connections.
#[derive(Debug)]
pub struct SlotPool<C> {
    slots: Box<[Option<Client<C>>]>,
}

impl<C: Connection> SlotPool<C> {
    /// Creates a pool with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    /// Number of slots (N).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `true` when `index` holds a handle, connected or not.
    pub fn is_occupied(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Session of the client in `index`, if any.
    pub fn session(&self, index: usize) -> Option<SessionId> {
        self.slots.get(index)?.as_ref().map(|c| c.session)
    }

    /// Mutable access to the connected client in `index`.
    ///
    /// Returns `None` for empty slots.  A slot whose handle has disconnected
    /// is not evicted here; use [`SlotPool::evict_if_stale`] for that.
    pub fn client_mut(&mut self, index: usize) -> Option<&mut Client<C>> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Admits a pending connection from `listener`, if there is one.
    pub fn accept_if_pending<L>(&mut self, listener: &mut L) -> AcceptOutcome
    where
        L: Listener<Conn = C>,
    {
        if !listener.has_pending() {
            return AcceptOutcome::Idle;
        }

        // Single pass: evict the stale handle we land on and remember where.
        let mut target = None;
        let mut replaced = None;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let usable = match slot.as_mut() {
                None => true,
                Some(client) => !client.conn.is_connected(),
            };
            if usable {
                if let Some(mut stale) = slot.take() {
                    stale.conn.close();
                    replaced = Some(stale.session);
                }
                target = Some(index);
                break;
            }
        }

        let Some(mut conn) = listener.accept() else {
            return AcceptOutcome::Idle;
        };
        let peer = conn.peer();

        match target {
            Some(slot) => {
                let session = Uuid::new_v4();
                info!(slot, %session, ?peer, "client connected");
                self.slots[slot] = Some(Client { session, conn });
                AcceptOutcome::Installed {
                    slot,
                    session,
                    peer,
                    replaced,
                }
            }
            None => {
                debug!(?peer, capacity = self.capacity(), "no free slot; rejecting client");
                conn.close();
                AcceptOutcome::Rejected { peer }
            }
        }
    }

    /// Closes and clears `index` if its handle is no longer connected.
    ///
    /// Returns the evicted session, or `None` when the slot was empty or still
    /// connected.
    pub fn evict_if_stale(&mut self, index: usize) -> Option<SessionId> {
        let slot = self.slots.get_mut(index)?;
        let stale = match slot.as_mut() {
            Some(client) => !client.conn.is_connected(),
            None => false,
        };
        if !stale {
            return None;
        }
        let mut client = slot.take()?;
        client.conn.close();
        debug!(slot = index, session = %client.session, "evicted disconnected client");
        Some(client.session)
    }

    /// Writes `data` to every connected client in index order.
    ///
    /// Per-client write failures are logged and skipped.  Stale handles found
    /// on the way are evicted.  Returns the number of clients written to.
    pub fn broadcast<Y: Scheduler>(&mut self, data: &[u8], scheduler: &Y) -> usize {
        let mut delivered = 0;
        for index in 0..self.slots.len() {
            if self.evict_if_stale(index).is_some() {
                continue;
            }
            if let Some(client) = self.slots[index].as_mut() {
                match client.conn.write_bytes(data) {
                    Ok(_) => delivered += 1,
                    Err(e) => debug!(slot = index, session = %client.session, "write failed: {e}"),
                }
                scheduler.yield_now();
            }
        }
        delivered
    }

    /// Closes every client and empties all slots.
    ///
    /// Returns the number of clients closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for slot in self.slots.iter_mut() {
            if let Some(mut client) = slot.take() {
                client.conn.close();
                closed += 1;
            }
        }
        closed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
