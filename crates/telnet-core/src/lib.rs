//! # telnet-core
//!
//! Shared building blocks for the telnet bridge: the bounded receive ring,
//! the fixed-size client slot pool, the line ingestion policy, and the
//! capability traits the bridge uses to talk to sockets and to its host
//! scheduler.
//!
//! This crate performs no I/O of its own.  Sockets, settings files, and the
//! controller's main loop live in `telnet-bridge`; here they are only traits.
//!
//! # Architecture overview
//!
//! ```text
//! Listener ──accept──▶ SlotPool [0..N) ──drain_line──▶ ReceiveBuffer ──▶ controller
//!                         ▲
//! controller ──broadcast──┘
//! ```
//!
//! - **`buffer`** – [`ReceiveBuffer`], a fixed-capacity byte ring shared by
//!   every client reader.
//! - **`slots`** – [`SlotPool`], N optional client handles with lazy eviction
//!   and reject-when-full admission.
//! - **`ingest`** – the per-tick drain policy: `\r` dropped, `\n` ends the
//!   tick.
//! - **`transport`** – [`Listener`], [`Connection`], [`ListenerFactory`] and
//!   [`Scheduler`] capabilities, plus an in-memory mock transport.

pub mod buffer;
pub mod ingest;
pub mod slots;
pub mod transport;

pub use buffer::ReceiveBuffer;
pub use ingest::{drain_line, Drain};
pub use slots::{AcceptOutcome, Client, SessionId, SlotPool};
pub use transport::{Connection, Listener, ListenerFactory, NoYield, Scheduler, ThreadYield};
