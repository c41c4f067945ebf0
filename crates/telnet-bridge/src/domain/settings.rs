//! Bridge settings and the store they are loaded from.
//!
//! [`BridgeSettings`] is read once per `start()`.  Every field has a default
//! so a missing file, or a file missing newer fields, still yields a working
//! configuration.
//!
//! ```toml
//! log_level = "info"
//!
//! [telnet]
//! enabled = true
//! port = 23
//! max_clients = 4
//! rx_buffer_size = 1200
//! no_delay = true
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TCP port (the standard telnet port).
pub const DEFAULT_TELNET_PORT: u16 = 23;
/// Default number of client slots.
pub const DEFAULT_MAX_CLIENTS: usize = 4;
/// Default receive ring capacity in bytes.
pub const DEFAULT_RX_BUFFER_SIZE: usize = 1200;

/// Error type for loading, saving, or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot be used.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the telnet bridge service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeSettings {
    /// When `false`, `start()` leaves the service inert.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TCP port to listen on.  `0` lets the OS pick one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of client slots (N).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Receive ring capacity in bytes (C).
    #[serde(default = "default_rx_buffer_size")]
    pub rx_buffer_size: usize,
    /// Disable packet coalescing on accepted connections.
    #[serde(default = "default_true")]
    pub no_delay: bool,
}

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub telnet: BridgeSettings,
}

fn default_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_TELNET_PORT
}
fn default_max_clients() -> usize {
    DEFAULT_MAX_CLIENTS
}
fn default_rx_buffer_size() -> usize {
    DEFAULT_RX_BUFFER_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_port(),
            max_clients: default_max_clients(),
            rx_buffer_size: default_rx_buffer_size(),
            no_delay: default_true(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            telnet: BridgeSettings::default(),
        }
    }
}

impl BridgeSettings {
    /// Rejects sizes the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_clients` or
    /// `rx_buffer_size` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "max_clients",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rx_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "rx_buffer_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Source of persisted bridge settings.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    /// Loads the current settings, applying defaults for anything absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the backing store exists but cannot be
    /// read or parsed.
    fn load(&self) -> Result<BridgeSettings, ConfigError>;
}

/// A store that always returns the same in-memory settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub BridgeSettings);

impl StaticSettings {
    pub fn new(settings: BridgeSettings) -> Self {
        Self(settings)
    }
}

impl SettingsStore for StaticSettings {
    fn load(&self) -> Result<BridgeSettings, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Values that replace whatever the underlying store says.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub port: Option<u16>,
    /// Forces `enabled = false`.
    pub disabled: bool,
}

impl SettingsOverrides {
    pub fn apply(&self, mut settings: BridgeSettings) -> BridgeSettings {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.disabled {
            settings.enabled = false;
        }
        settings
    }
}

/// A store that layers [`SettingsOverrides`] over every load of `inner`.
#[derive(Debug, Clone)]
pub struct OverriddenSettings<S> {
    inner: S,
    overrides: SettingsOverrides,
}

impl<S> OverriddenSettings<S> {
    pub fn new(inner: S, overrides: SettingsOverrides) -> Self {
        Self { inner, overrides }
    }
}

impl<S: SettingsStore> SettingsStore for OverriddenSettings<S> {
    fn load(&self) -> Result<BridgeSettings, ConfigError> {
        self.inner.load().map(|s| self.overrides.apply(s))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
