//! Domain layer for telnet-bridge.
//!
//! Settings types and the [`SettingsStore`] port through which the service
//! reads its enable flag, port, and sizing at start-up.  Nothing here opens a
//! socket or touches the file system.

pub mod settings;

pub use settings::{
    BridgeSettings, ConfigError, ControllerConfig, OverriddenSettings, SettingsOverrides,
    SettingsStore, StaticSettings,
};
