//! Persisted, non-secret extension settings.
//!
//! Settings are plain strings addressed by dotted keys, in the manner of an
//! editor's settings store. Two implementations are provided:
//! - [`FileConfigStore`] - a flat TOML table in the platform config directory
//! - [`MemoryConfigStore`] - in-memory storage for tests
//!
//! [`ExtensionConfig`] is the typed view the login flow works with.
//!
//! # Storage Location
//!
//! `~/.config/authlens/settings.toml` on Linux, the equivalent application
//! support / `%APPDATA%` directory elsewhere.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings key of the identity provider base URL.
pub const BASE_URL_KEY: &str = "iam.baseUrl";

/// Settings key of the OAuth client identifier.
pub const CLIENT_ID_KEY: &str = "iam.clientId";

/// Error type for settings store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading or writing the settings file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration directory not available.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,
}

/// String-keyed settings storage.
pub trait ConfigStore: Send + Sync {
    /// Read a setting. Returns `Ok(None)` when it was never written.
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Write a setting, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError>;
}

/// Platform-specific project directories for authlens.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "authlens", "authlens")
}

/// Settings persisted as a flat TOML table.
///
/// The file is read once on load and rewritten after every `set`.
pub struct FileConfigStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileConfigStore {
    /// Get the default settings path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::ConfigDirUnavailable)?;
        Ok(dirs.config_dir().join("settings.toml"))
    }

    /// Load the settings store from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Self::default_path()?)
    }

    /// Load the settings store from a specific path.
    ///
    /// A missing file is treated as empty settings; it is created on the
    /// first write.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(data)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigStore")
            .field("path", &self.path)
            .finish()
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut data = self.data.write();
        data.insert(key.to_string(), value.to_string());
        self.save(&data)
    }
}

/// In-memory settings store for testing.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Non-secret settings of the single active identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Identity provider base URL, e.g. `https://localhost:9443/oauth2`.
    pub base_url: Option<String>,

    /// OAuth client identifier registered with the provider.
    pub client_id: Option<String>,
}

impl ExtensionConfig {
    /// Read the current settings.
    pub fn load(store: &dyn ConfigStore) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: store.get(BASE_URL_KEY)?,
            client_id: store.get(CLIENT_ID_KEY)?,
        })
    }

    /// Write both settings.
    pub fn save(store: &dyn ConfigStore, base_url: &str, client_id: &str) -> Result<(), ConfigError> {
        store.set(BASE_URL_KEY, base_url)?;
        store.set(CLIENT_ID_KEY, client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let store = FileConfigStore::load_from_path(path.clone()).unwrap();
        ExtensionConfig::save(&store, "https://idp.example", "abc").unwrap();

        let reloaded = FileConfigStore::load_from_path(path).unwrap();
        let config = ExtensionConfig::load(&reloaded).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://idp.example"));
        assert_eq!(config.client_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::load_from_path(dir.path().join("none.toml")).unwrap();

        assert_eq!(ExtensionConfig::load(&store).unwrap(), ExtensionConfig::default());
    }

    #[test]
    fn test_file_store_rejects_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "not = [valid").unwrap();

        let result = FileConfigStore::load_from_path(path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryConfigStore::new();
        store.set(CLIENT_ID_KEY, "first").unwrap();
        store.set(CLIENT_ID_KEY, "second").unwrap();
        assert_eq!(store.get(CLIENT_ID_KEY).unwrap().as_deref(), Some("second"));
        assert!(store.get(BASE_URL_KEY).unwrap().is_none());
    }
}
