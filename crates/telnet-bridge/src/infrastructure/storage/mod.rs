//! Storage infrastructure: settings file persistence.
//!
//! The `config` sub-module reads and writes [`ControllerConfig`] as TOML and
//! falls back to defaults when the file does not exist yet.
//!
//! [`ControllerConfig`]: crate::domain::ControllerConfig

pub mod config;
