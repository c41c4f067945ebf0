//! TOML-backed [`SettingsStore`].
//!
//! The bridge reads its settings from a single file (by default
//! `telnet-bridge.toml` in the working directory):
//!
//! ```toml
//! log_level = "debug"
//!
//! [telnet]
//! port = 2323
//! max_clients = 2
//! ```
//!
//! Missing keys take their defaults, and a missing file is the same as an
//! empty one.  Every [`SettingsStore::load`] re-reads the file, so a service
//! built on this store picks up edits across a stop/start cycle.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::settings::{BridgeSettings, ConfigError, ControllerConfig, SettingsStore};

/// Settings store backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole settings file, returning defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system errors other than "not
    /// found", and [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load_config(&self) -> Result<ControllerConfig, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let cfg: ControllerConfig = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file; using defaults");
                Ok(ControllerConfig::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Writes `config` to the file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save_config(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<BridgeSettings, ConfigError> {
        let telnet = self.load_config()?.telnet;
        telnet.validate()?;
        Ok(telnet)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::settings::{OverriddenSettings, SettingsOverrides};

    /// A unique path under the system temp directory; removed on drop.
    struct TempPath(PathBuf);

    impl TempPath {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("telnet-bridge-{}", Uuid::new_v4()));
            Self(dir.join("settings.toml"))
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            if let Some(dir) = self.0.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempPath::new();
        let store = TomlSettingsStore::new(&tmp.0);

        let settings = store.load().expect("load");

        assert_eq!(settings, BridgeSettings::default());
    }

    #[test]
    fn test_save_then_load_returns_saved_settings() {
        // Arrange
        let tmp = TempPath::new();
        let store = TomlSettingsStore::new(&tmp.0);
        let mut cfg = ControllerConfig::default();
        cfg.log_level = "debug".to_string();
        cfg.telnet.port = 2323;
        cfg.telnet.enabled = false;

        // Act
        store.save_config(&cfg).expect("save");
        let loaded = store.load_config().expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        assert_eq!(store.load().expect("settings").port, 2323);
    }

    #[test]
    fn test_each_load_rereads_the_file_under_overrides() {
        // Arrange
        let tmp = TempPath::new();
        let file = TomlSettingsStore::new(&tmp.0);
        let mut cfg = ControllerConfig::default();
        cfg.telnet.max_clients = 2;
        file.save_config(&cfg).expect("save");
        let store = OverriddenSettings::new(
            file.clone(),
            SettingsOverrides {
                port: Some(2323),
                disabled: false,
            },
        );
        assert_eq!(store.load().expect("first load").max_clients, 2);

        // Act: edit the file between loads
        cfg.telnet.max_clients = 3;
        file.save_config(&cfg).expect("save again");
        let reloaded = store.load().expect("second load");

        // Assert
        assert_eq!(reloaded.max_clients, 3);
        assert_eq!(reloaded.port, 2323);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = TempPath::new();
        std::fs::create_dir_all(tmp.0.parent().expect("parent")).expect("mkdir");
        std::fs::write(&tmp.0, "[telnet\nport = ").expect("write");
        let store = TomlSettingsStore::new(&tmp.0);

        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_sized_buffer_in_file_is_rejected() {
        let tmp = TempPath::new();
        std::fs::create_dir_all(tmp.0.parent().expect("parent")).expect("mkdir");
        std::fs::write(&tmp.0, "[telnet]\nrx_buffer_size = 0\n").expect("write");
        let store = TomlSettingsStore::new(&tmp.0);

        assert!(matches!(
            store.load(),
            Err(ConfigError::Invalid { field: "rx_buffer_size", .. })
        ));
    }

    #[test]
    fn test_directory_path_is_io_error() {
        // Reading a directory as a file fails with something other than NotFound.
        let tmp = TempPath::new();
        let dir = tmp.0.parent().expect("parent").to_path_buf();
        std::fs::create_dir_all(&dir).expect("mkdir");
        let store = TomlSettingsStore::new(&dir);

        assert!(matches!(store.load_config(), Err(ConfigError::Io { .. })));
    }
}
