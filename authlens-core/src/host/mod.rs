//! Capabilities borrowed from the embedding host.
//!
//! The coordinators never reach for global state. Everything they need from
//! the outside world (opening URLs, the credential vault, the settings store,
//! reading files, showing panels, telling the user something, handling
//! diagram button clicks) is passed in through a [`HostContext`] of trait
//! objects, so any of them can be swapped for a test double.
//!
//! - [`system`] - implementations backed by the real system
//! - [`recording`] - in-memory implementations that record every interaction

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::config::ConfigStore;
use crate::model::PanelId;
use crate::store::SecretStore;

pub mod recording;
pub mod system;

/// Receiving end of a panel's inbound message channel.
///
/// Messages arrive in the order the panel produced them. The channel closes
/// when the panel is closed.
pub type PanelInbox = mpsc::UnboundedReceiver<Value>;

/// Error type for host capability failures.
#[derive(Debug, Error)]
pub enum HostError {
    /// The external URL could not be opened.
    #[error("failed to open {url}: {message}")]
    Browser { url: String, message: String },

    /// A panel could not be created or updated.
    #[error("panel error: {message}")]
    Panel { message: String },

    /// The panel was already closed.
    #[error("panel {0} is closed")]
    Closed(PanelId),
}

/// What a panel is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKind {
    /// Protocol flow diagram of one resource.
    Diagram,

    /// Identity provider login surface.
    Login,
}

/// A user-visible rendering surface.
pub trait Surface: Send + Sync + fmt::Debug {
    /// Identity of this surface.
    fn id(&self) -> PanelId;

    /// Replace the rendered HTML.
    fn set_html(&self, html: &str) -> Result<(), HostError>;

    /// Send a message to the page hosted by the surface.
    fn post_message(&self, message: &Value) -> Result<(), HostError>;

    /// Close the surface. Closing an already closed surface does nothing.
    fn close(&self);

    /// Whether the surface has been closed.
    fn is_closed(&self) -> bool;
}

/// Creates rendering surfaces.
pub trait PanelHost: Send + Sync {
    /// Create a new panel and return it with its inbound message channel.
    fn create_panel(
        &self,
        kind: PanelKind,
        title: &str,
    ) -> Result<(Arc<dyn Surface>, PanelInbox), HostError>;
}

/// Opens external URLs, usually in the system browser.
pub trait UrlOpener: Send + Sync {
    /// Open `url`.
    fn open(&self, url: &Url) -> Result<(), HostError>;
}

/// User-visible notifications.
pub trait Notifier: Send + Sync {
    /// Show an informational message.
    fn info(&self, message: &str);

    /// Show an error message.
    fn error(&self, message: &str);
}

/// Reads resource and template files.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Read a whole file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Handles actions posted by a diagram panel.
pub trait ButtonClickHandler: Send + Sync {
    /// Handle `message`, posted by the panel showing `resource_path`.
    fn handle(&self, message: Value, resource_path: &Path);
}

/// Every host capability the coordinators use.
#[derive(Clone)]
pub struct HostContext {
    /// External URL opener.
    pub urls: Arc<dyn UrlOpener>,

    /// OS credential vault.
    pub vault: Arc<dyn SecretStore>,

    /// Non-secret settings store.
    pub settings: Arc<dyn ConfigStore>,

    /// File reader for resources and templates.
    pub files: Arc<dyn ResourceReader>,

    /// Panel factory.
    pub panels: Arc<dyn PanelHost>,

    /// User notifications.
    pub notifier: Arc<dyn Notifier>,

    /// Diagram action handler.
    pub buttons: Arc<dyn ButtonClickHandler>,
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext").finish_non_exhaustive()
    }
}
