//! Infrastructure layer for telnet-bridge.
//!
//! Adapters from the `telnet-core` capability traits and the
//! [`SettingsStore`](crate::domain::SettingsStore) port to the real world.
//!
//! # Responsibilities
//!
//! - Binding a non-blocking TCP listener and accepting connections
//! - Buffering socket reads so per-byte polls stay cheap
//! - Reading and writing the TOML settings file
//!
//! # What does NOT belong here?
//!
//! - Slot management and line assembly (that is `telnet-core`)
//! - Lifecycle decisions (that is the application layer)

pub mod storage;
pub mod tcp;

pub use storage::config::TomlSettingsStore;
pub use tcp::{StdTcpConnection, StdTcpListener, StdTcpListenerFactory};
