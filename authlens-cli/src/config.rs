//! CLI configuration handling.

use anyhow::{Context, Result};
use authlens_core::config::{FileConfigStore, project_dirs};
use authlens_core::{LoginSettings, PreviewSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding `diagram.html` and `authentication.html`.
    pub asset_root: PathBuf,

    /// Directory rendered panels are written to.
    pub panel_dir: PathBuf,

    /// Settings file holding the identity provider base URL and client id.
    pub settings_path: PathBuf,

    /// Loopback port the login redirect is captured on.
    pub redirect_port: u16,

    /// Path of the login redirect URI.
    pub redirect_path: String,

    /// Seconds a login may wait for the redirect and the access token.
    pub capture_timeout_secs: u64,

    /// Seconds to wait for the vault before rendering the login page.
    pub vault_timeout_secs: u64,

    /// Store secrets in the OS keyring when it is reachable.
    pub use_keyring: bool,

    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        let panel_dir = dirs
            .as_ref()
            .map(|d| d.cache_dir().join("panels"))
            .unwrap_or_else(|| std::env::temp_dir().join("authlens-panels"));
        let settings_path =
            FileConfigStore::default_path().unwrap_or_else(|_| PathBuf::from("authlens-settings.toml"));
        let login = LoginSettings::default();
        let preview = PreviewSettings::default();

        Self {
            config_path: PathBuf::new(),
            asset_root: PathBuf::from("assets"),
            panel_dir,
            settings_path,
            redirect_port: login.redirect_port,
            redirect_path: login.redirect_path,
            capture_timeout_secs: login.capture_timeout.as_secs(),
            vault_timeout_secs: preview.vault_timeout.as_secs(),
            use_keyring: true,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Settings for the login flow.
    pub fn login_settings(&self) -> LoginSettings {
        LoginSettings {
            redirect_port: self.redirect_port,
            redirect_path: self.redirect_path.clone(),
            capture_timeout: Duration::from_secs(self.capture_timeout_secs),
        }
    }

    /// Settings for previews and the login page.
    pub fn preview_settings(&self) -> PreviewSettings {
        PreviewSettings {
            vault_timeout: Duration::from_secs(self.vault_timeout_secs),
            ..PreviewSettings::default()
        }
    }
}

/// Default location of `authlens.toml`.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("authlens.toml"))
        .unwrap_or_else(|| PathBuf::from("authlens.toml"))
}

/// Load configuration from `path`, or the default location, or create defaults.
///
/// An explicitly given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else if path.is_some() {
        anyhow::bail!("Config file {:?} does not exist", config_path);
    } else {
        AppConfig::default()
    };

    config.config_path = config_path;

    std::fs::create_dir_all(&config.panel_dir)
        .with_context(|| format!("Failed to create panel directory {:?}", config.panel_dir))?;

    Ok(config)
}
