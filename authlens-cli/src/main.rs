//! Authlens CLI
//!
//! Command-line host for authlens diagram previews and the identity server
//! login.
//!
//! # Usage
//!
//! ```bash
//! # Render diagram previews and open them in the browser
//! authlens preview flows/login.xml "flows/My%20Service.xml"
//!
//! # Open the login page; paste messages from the page as JSON lines
//! authlens login
//!
//! # Log in without the form
//! authlens login --base-url https://localhost:9443/oauth2 --client-id abc --client-secret s3cr3t
//!
//! # Show what is configured and stored
//! authlens status
//! ```

mod config;
mod host;

use anyhow::{Context, Result};
use authlens_core::config::ExtensionConfig;
use authlens_core::host::HostContext;
use authlens_core::host::system::{
    BrowserOpener, FsResourceReader, TracingButtonHandler, TracingNotifier,
};
use authlens_core::{
    BraceTemplate, ConfigStore, CredentialKey, FileConfigStore, LoginState, PreviewCoordinator,
    SecretStore, create_store,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::host::FilePanelHost;

#[derive(Parser)]
#[command(name = "authlens")]
#[command(about = "Identity protocol flow previews and identity server login")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to authlens.toml in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a diagram preview for each resource
    Preview {
        /// Resource files to preview
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Open the identity server login page
    Login {
        /// Identity server base URL
        #[arg(long)]
        base_url: Option<String>,

        /// OAuth client identifier
        #[arg(long)]
        client_id: Option<String>,

        /// OAuth client secret
        #[arg(long)]
        client_secret: Option<String>,
    },

    /// Show the configured identity server and stored credentials
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    init_logging(&config.log_level, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    match cli.command {
        Commands::Preview { paths } => preview(&config, &paths).await,
        Commands::Login {
            base_url,
            client_id,
            client_secret,
        } => login(&config, base_url, client_id, client_secret).await,
        Commands::Status => status(&config).await,
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a command needs to drive the core.
struct Session {
    preview: PreviewCoordinator,
    panels: Arc<FilePanelHost>,
    vault: Arc<dyn SecretStore>,
    settings: Arc<dyn ConfigStore>,
}

fn open_session(config: &AppConfig) -> Result<Session> {
    let settings: Arc<dyn ConfigStore> = Arc::new(
        FileConfigStore::load_from_path(config.settings_path.clone())
            .with_context(|| format!("Failed to load settings from {:?}", config.settings_path))?,
    );
    let vault: Arc<dyn SecretStore> = Arc::from(create_store(config.use_keyring));
    let urls = Arc::new(BrowserOpener);
    let panels = Arc::new(FilePanelHost::new(&config.panel_dir, urls.clone()));

    let context = HostContext {
        urls,
        vault: vault.clone(),
        settings: settings.clone(),
        files: Arc::new(FsResourceReader),
        panels: panels.clone(),
        notifier: Arc::new(TracingNotifier),
        buttons: Arc::new(TracingButtonHandler),
    };

    let preview = PreviewCoordinator::new(
        context,
        config.preview_settings(),
        config.login_settings(),
        Arc::new(BraceTemplate::new()),
    );

    Ok(Session {
        preview,
        panels,
        vault,
        settings,
    })
}

async fn preview(config: &AppConfig, paths: &[PathBuf]) -> Result<()> {
    let session = open_session(config)?;
    let mut failed = 0;

    for path in paths {
        match session
            .preview
            .show_resource_preview(path, &config.asset_root)
            .await
        {
            Ok(key) => {
                let handle = session.preview.registry().get(&key);
                info!("Previewing {}", key);
                if let Some(handle) = handle {
                    println!("{}\t{}", key, handle.resource_path().display());
                }
            }
            // Already reported to the user by the coordinator.
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} previews failed", failed, paths.len());
    }
    Ok(())
}

async fn login(
    config: &AppConfig,
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<()> {
    let session = open_session(config)?;
    session
        .preview
        .show_login_surface(&config.asset_root)
        .await
        .context("Failed to open the login page")?;

    let surface = session
        .panels
        .login_surface()
        .context("Login page was not created")?;
    let mut closed = surface.closed();

    if let (Some(base_url), Some(client_id), Some(client_secret)) = (base_url, client_id, client_secret)
    {
        session.panels.send_to_login(json!({
            "command": "LOGIN",
            "baseUrl": base_url,
            "clientID": client_id,
            "clientSecret": client_secret,
        }));
    }

    eprintln!("Paste messages from the login page, one JSON object per line.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str(line) {
                    Ok(message) => {
                        session.panels.send_to_login(message);
                    }
                    Err(e) => eprintln!("error: not a JSON message: {}", e),
                }
            }
            _ = closed.wait_for(|closed| *closed) => break,
        }
    }

    match session.preview.oauth().state() {
        LoginState::Persisted => Ok(()),
        LoginState::Failed(reason) => anyhow::bail!("Login failed: {:?}", reason),
        state => {
            info!(?state, "Login page closed before the login finished");
            Ok(())
        }
    }
}

async fn status(config: &AppConfig) -> Result<()> {
    let session = open_session(config)?;
    let extension = ExtensionConfig::load(session.settings.as_ref())?;

    let stored = |present: bool| if present { "stored" } else { "not stored" };
    let client_secret = session.vault.exists(&CredentialKey::client_secret()).await?;
    let access_token = session.vault.exists(&CredentialKey::access_token()).await?;

    println!(
        "Base URL:      {}",
        extension.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Client ID:     {}",
        extension.client_id.as_deref().unwrap_or("(not set)")
    );
    println!("Client secret: {}", stored(client_secret));
    println!("Access token:  {}", stored(access_token));
    println!("Settings file: {}", config.settings_path.display());
    Ok(())
}
