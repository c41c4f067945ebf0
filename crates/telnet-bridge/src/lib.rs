//! telnet-bridge library crate.
//!
//! Lets a small, fixed number of TCP clients talk to a line-oriented
//! controller.  Client input is merged into one bounded receive ring that the
//! controller reads a line at a time; controller output is broadcast to every
//! connected client.
//!
//! # Architecture
//!
//! ```text
//! TCP clients (raw bytes, \n-terminated lines)
//!         ↕
//! [telnet-bridge]
//!   ├── domain/           BridgeSettings, ControllerConfig, SettingsStore
//!   ├── application/      BridgeService: start/stop, handle() tick, write()
//!   └── infrastructure/
//!         ├── tcp/        Non-blocking std TCP listener and connections
//!         └── storage/    TOML settings file
//!         ↕
//! controller (main loop calling handle(), read_line(), write())
//! ```
//!
//! # Layer rules
//!
//! - `domain` holds plain settings types and the store trait; no sockets.
//! - `application` depends on `domain` and `telnet-core` only.
//! - `infrastructure` implements the `telnet-core` capability traits over
//!   real sockets and files.

pub mod domain;

pub mod application;

pub mod infrastructure;
