//! In-memory host that records every interaction.
//!
//! [`RecordingHost`] stands in for the embedding application in tests and
//! headless runs. Panels are [`RecordingSurface`]s that keep their HTML and
//! outbound messages, and expose [`RecordingSurface::send`] so a test can
//! play the part of the page posting messages back.

use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use url::Url;

use super::{
    ButtonClickHandler, HostContext, HostError, Notifier, PanelHost, PanelInbox, PanelKind,
    ResourceReader, Surface, UrlOpener,
};
use crate::config::ConfigStore;
use crate::model::PanelId;
use crate::store::SecretStore;

/// A notification shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Info(String),
    Error(String),
}

/// A panel created by [`RecordingHost`].
#[derive(Debug)]
pub struct RecordingSurface {
    id: PanelId,
    kind: PanelKind,
    title: String,
    html: Mutex<String>,
    posted: Mutex<Vec<Value>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    closed: AtomicBool,
}

impl RecordingSurface {
    /// What the panel is for.
    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    /// Title the panel was created with.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Currently rendered HTML.
    pub fn html(&self) -> String {
        self.html.lock().clone()
    }

    /// Messages posted to the page, oldest first.
    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().clone()
    }

    /// Post `message` from the page to whoever wired the panel.
    ///
    /// Returns `false` once the panel is closed.
    pub fn send(&self, message: Value) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }
}

impl Surface for RecordingSurface {
    fn id(&self) -> PanelId {
        self.id
    }

    fn set_html(&self, html: &str) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed(self.id));
        }
        *self.html.lock() = html.to_string();
        Ok(())
    }

    fn post_message(&self, message: &Value) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed(self.id));
        }
        self.posted.lock().push(message.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.sender.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Host double recording opened URLs, notifications, panels and clicks.
#[derive(Debug, Default)]
pub struct RecordingHost {
    opened: Mutex<Vec<Url>>,
    notifications: Mutex<Vec<Notification>>,
    panels: Mutex<Vec<Arc<RecordingSurface>>>,
    clicks: Mutex<Vec<(Value, PathBuf)>>,
    fail_panels: AtomicBool,
}

impl RecordingHost {
    /// Create an empty recording host.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a [`HostContext`] that routes the URL, panel, notification and
    /// click capabilities to this host.
    pub fn context(
        self: &Arc<Self>,
        vault: Arc<dyn SecretStore>,
        settings: Arc<dyn ConfigStore>,
        files: Arc<dyn ResourceReader>,
    ) -> HostContext {
        HostContext {
            urls: self.clone(),
            vault,
            settings,
            files,
            panels: self.clone(),
            notifier: self.clone(),
            buttons: self.clone(),
        }
    }

    /// Make every later `create_panel` call fail.
    pub fn fail_panel_creation(&self) {
        self.fail_panels.store(true, Ordering::SeqCst);
    }

    /// URLs opened so far.
    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }

    /// Notifications shown so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Error notifications shown so far.
    pub fn errors(&self) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Error(message) => Some(message.clone()),
                Notification::Info(_) => None,
            })
            .collect()
    }

    /// Every panel created so far, oldest first.
    pub fn panels(&self) -> Vec<Arc<RecordingSurface>> {
        self.panels.lock().clone()
    }

    /// Most recently created panel of `kind`.
    pub fn last_panel(&self, kind: PanelKind) -> Option<Arc<RecordingSurface>> {
        self.panels
            .lock()
            .iter()
            .rev()
            .find(|p| p.kind == kind)
            .cloned()
    }

    /// Diagram actions forwarded so far with their resource path.
    pub fn clicks(&self) -> Vec<(Value, PathBuf)> {
        self.clicks.lock().clone()
    }
}

impl PanelHost for RecordingHost {
    fn create_panel(
        &self,
        kind: PanelKind,
        title: &str,
    ) -> Result<(Arc<dyn Surface>, PanelInbox), HostError> {
        if self.fail_panels.load(Ordering::SeqCst) {
            return Err(HostError::Panel {
                message: "panel creation disabled".to_string(),
            });
        }

        let (sender, inbox) = mpsc::unbounded_channel();
        let surface = Arc::new(RecordingSurface {
            id: PanelId::new(),
            kind,
            title: title.to_string(),
            html: Mutex::new(String::new()),
            posted: Mutex::new(Vec::new()),
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
        });
        self.panels.lock().push(surface.clone());
        Ok((surface, inbox))
    }
}

impl UrlOpener for RecordingHost {
    fn open(&self, url: &Url) -> Result<(), HostError> {
        self.opened.lock().push(url.clone());
        Ok(())
    }
}

impl Notifier for RecordingHost {
    fn info(&self, message: &str) {
        self.notifications
            .lock()
            .push(Notification::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notifications
            .lock()
            .push(Notification::Error(message.to_string()));
    }
}

impl ButtonClickHandler for RecordingHost {
    fn handle(&self, message: Value, resource_path: &Path) {
        self.clicks.lock().push((message, resource_path.to_path_buf()));
    }
}
