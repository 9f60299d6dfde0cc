//! Terminal host for the authlens panels.
//!
//! Panels are HTML files written to the panel directory and opened in the
//! system browser. Messages the core posts to a panel are printed to stdout
//! as JSON lines; messages from the page are fed back with
//! [`FilePanelHost::send_to_login`].

use authlens_core::host::{HostError, PanelHost, PanelInbox, PanelKind, Surface, UrlOpener};
use authlens_core::PanelId;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use url::Url;

/// A panel backed by an HTML file.
pub struct FileSurface {
    id: PanelId,
    path: PathBuf,
    opener: Arc<dyn UrlOpener>,
    opened: AtomicBool,
    sender: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    closed: watch::Sender<bool>,
}

impl FileSurface {
    /// Receiver that flips to `true` when the panel closes.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Deliver a message as if the page had posted it.
    ///
    /// Returns `false` once the panel is closed.
    pub fn send(&self, message: Value) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    fn open_in_browser(&self) -> Result<(), HostError> {
        let invalid = || HostError::Panel {
            message: format!("{} cannot be opened as a file URL", self.path.display()),
        };
        let path = std::path::absolute(&self.path).map_err(|_| invalid())?;
        let url = Url::from_file_path(path).map_err(|_| invalid())?;
        self.opener.open(&url)
    }
}

impl fmt::Debug for FileSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSurface")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Surface for FileSurface {
    fn id(&self) -> PanelId {
        self.id
    }

    fn set_html(&self, html: &str) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed(self.id));
        }
        std::fs::write(&self.path, html).map_err(|e| HostError::Panel {
            message: format!("failed to write {}: {}", self.path.display(), e),
        })?;
        debug!(panel = %self.id, path = %self.path.display(), "Rendered panel");

        if !self.opened.swap(true, Ordering::SeqCst) {
            self.open_in_browser()?;
        }
        Ok(())
    }

    fn post_message(&self, message: &Value) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed(self.id));
        }
        println!("{}", message);
        Ok(())
    }

    fn close(&self) {
        self.sender.lock().take();
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Creates [`FileSurface`]s in one directory.
pub struct FilePanelHost {
    dir: PathBuf,
    opener: Arc<dyn UrlOpener>,
    login: Mutex<Option<Arc<FileSurface>>>,
}

impl FilePanelHost {
    /// Create a host writing panels to `dir`.
    pub fn new(dir: impl Into<PathBuf>, opener: Arc<dyn UrlOpener>) -> Self {
        Self {
            dir: dir.into(),
            opener,
            login: Mutex::new(None),
        }
    }

    /// The most recently created login panel.
    pub fn login_surface(&self) -> Option<Arc<FileSurface>> {
        self.login.lock().clone()
    }

    /// Deliver a message to the current login panel.
    pub fn send_to_login(&self, message: Value) -> bool {
        match self.login_surface() {
            Some(surface) => surface.send(message),
            None => {
                warn!("No login page is open");
                false
            }
        }
    }
}

impl fmt::Debug for FilePanelHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePanelHost")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl PanelHost for FilePanelHost {
    fn create_panel(
        &self,
        kind: PanelKind,
        title: &str,
    ) -> Result<(Arc<dyn Surface>, PanelInbox), HostError> {
        let id = PanelId::new();
        let prefix = match kind {
            PanelKind::Diagram => "diagram",
            PanelKind::Login => "login",
        };
        let path = self.dir.join(format!("{}-{}.html", prefix, id));

        let (sender, inbox) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let surface = Arc::new(FileSurface {
            id,
            path,
            opener: Arc::clone(&self.opener),
            opened: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            closed,
        });

        if kind == PanelKind::Login {
            *self.login.lock() = Some(Arc::clone(&surface));
        }
        debug!(panel = %id, %title, "Created panel");
        Ok((surface, inbox))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct CollectingOpener {
        urls: Mutex<Vec<Url>>,
    }

    impl UrlOpener for CollectingOpener {
        fn open(&self, url: &Url) -> Result<(), HostError> {
            self.urls.lock().push(url.clone());
            Ok(())
        }
    }

    fn host(dir: &TempDir) -> (FilePanelHost, Arc<CollectingOpener>) {
        let opener = Arc::new(CollectingOpener::default());
        (FilePanelHost::new(dir.path(), opener.clone()), opener)
    }

    #[test]
    fn test_set_html_writes_file_and_opens_it_once() {
        let dir = TempDir::new().unwrap();
        let (host, opener) = host(&dir);
        let (surface, _inbox) = host.create_panel(PanelKind::Diagram, "flow").unwrap();

        surface.set_html("<p>one</p>").unwrap();
        surface.set_html("<p>two</p>").unwrap();

        let urls = opener.urls.lock().clone();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].scheme(), "file");
        let path = urls[0].to_file_path().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<p>two</p>");
    }

    #[tokio::test]
    async fn test_login_messages_reach_inbox_until_closed() {
        let dir = TempDir::new().unwrap();
        let (host, _opener) = host(&dir);
        let (surface, mut inbox) = host.create_panel(PanelKind::Login, "Login").unwrap();
        let mut closed = host.login_surface().unwrap().closed();

        assert!(host.send_to_login(json!({"command": "PING"})));
        assert_eq!(inbox.recv().await, Some(json!({"command": "PING"})));

        surface.close();
        assert!(closed.wait_for(|c| *c).await.is_ok());
        assert!(!host.send_to_login(json!({"command": "PING"})));
        assert_eq!(inbox.recv().await, None);
        assert!(matches!(surface.set_html("<p/>"), Err(HostError::Closed(_))));
    }

    #[test]
    fn test_no_login_panel() {
        let dir = TempDir::new().unwrap();
        let (host, _opener) = host(&dir);
        host.create_panel(PanelKind::Diagram, "flow").unwrap();
        assert!(!host.send_to_login(json!({})));
    }
}
