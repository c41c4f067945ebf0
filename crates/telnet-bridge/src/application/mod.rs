//! Application layer for telnet-bridge.
//!
//! [`BridgeService`] owns the listener, the slot pool, and the receive ring,
//! and exposes the controller-facing operations: `start`, `stop`, `handle`,
//! `write`, `available`, `peek`, `read`.
//!
//! # What does NOT belong here?
//!
//! - Opening sockets (that is `infrastructure::tcp`)
//! - Reading the settings file (that is `infrastructure::storage`)
//! - Scheduling ticks (that is the controller's main loop, see `main.rs`)

pub mod bridge_service;

pub use bridge_service::{BridgeError, BridgeEvent, BridgeService, ServiceState, StartOutcome};
