//! Preview façade.
//!
//! [`PreviewCoordinator`] is what the host's commands call. It renders
//! diagram panels for resources, keeps them in the [`PanelRegistry`], and
//! opens the login panel in front of the [`OAuthFlowCoordinator`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ExtensionConfig};
use crate::host::{HostContext, HostError, PanelInbox, PanelKind};
use crate::model::{CredentialKey, PanelId, ResourceKey};
use crate::oauth::{LoginCommand, LoginSettings, OAuthFlowCoordinator};
use crate::registry::{PanelHandle, PanelRegistry};
use crate::store::Secret;
use crate::template::{escape_html, Placeholders, TemplateError, TemplateRenderer};

/// Title of the login panel.
pub const LOGIN_TITLE: &str = "Identity Server Login";

/// Protocol message labels substituted into the diagram template.
pub const PROTOCOL_LABELS: [(&str, &str); 6] = [
    ("SAML_REQUEST", "SAML Request"),
    ("SAML_RESPONSE", "SAML Response"),
    ("OIDC_AUTHZ_REQUEST", "OIDC Authorization Request"),
    ("OIDC_AUTHZ_RESPONSE", "OIDC Authorization Response"),
    ("OIDC_TOKEN_REQUEST", "OIDC Token Request"),
    ("OIDC_TOKEN_RESPONSE", "OIDC Token Response"),
];

/// Error type for preview operations.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The resource file could not be read.
    #[error("failed to read {path}: {source}")]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Template names and timeouts used by the previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    /// Bound on reading the stored client secret for the login panel.
    pub vault_timeout: Duration,

    /// Diagram template, relative to the asset root.
    pub diagram_template: String,

    /// Login template, relative to the asset root.
    pub login_template: String,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            vault_timeout: Duration::from_secs(5),
            diagram_template: "diagram.html".to_string(),
            login_template: "authentication.html".to_string(),
        }
    }
}

/// Entry point for diagram previews and the login panel.
#[derive(Clone)]
pub struct PreviewCoordinator {
    host: HostContext,
    settings: PreviewSettings,
    renderer: Arc<dyn TemplateRenderer>,
    registry: Arc<PanelRegistry>,
    oauth: OAuthFlowCoordinator,
}

impl fmt::Debug for PreviewCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewCoordinator")
            .field("settings", &self.settings)
            .field("panels", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl PreviewCoordinator {
    /// Create a coordinator with an empty registry and an idle login flow.
    pub fn new(
        host: HostContext,
        settings: PreviewSettings,
        login: LoginSettings,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        let oauth = OAuthFlowCoordinator::new(host.clone(), login);
        Self {
            host,
            settings,
            renderer,
            registry: Arc::new(PanelRegistry::new()),
            oauth,
        }
    }

    /// Open diagram panels.
    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    /// The login flow behind the login panel.
    pub fn oauth(&self) -> &OAuthFlowCoordinator {
        &self.oauth
    }

    /// Show a diagram panel for the resource at `path`.
    ///
    /// A panel already showing the same resource key is replaced in the
    /// registry. Failures are reported to the user and returned.
    pub async fn show_resource_preview(
        &self,
        path: &Path,
        asset_root: &Path,
    ) -> Result<ResourceKey, PreviewError> {
        let result = self.open_resource_preview(path, asset_root).await;
        if let Err(e) = &result {
            error!(path = %path.display(), "Preview failed: {}", e);
            self.host
                .notifier
                .error(&format!("Could not preview {}: {}", path.display(), e));
        }
        result
    }

    async fn open_resource_preview(
        &self,
        path: &Path,
        asset_root: &Path,
    ) -> Result<ResourceKey, PreviewError> {
        let key = ResourceKey::from_path(path);
        let html = self.render_diagram(path, asset_root).await?;

        let (surface, inbox) = self.host.panels.create_panel(PanelKind::Diagram, key.as_str())?;
        surface.set_html(&html)?;
        let id = surface.id();

        self.registry
            .upsert(key.clone(), PanelHandle::new(surface, html, path, asset_root));
        self.wire_diagram(key.clone(), id, path.to_path_buf(), inbox);

        info!(key = %key, panel = %id, "Opened diagram preview");
        Ok(key)
    }

    /// Re-render every registered panel in place.
    ///
    /// Each resource is re-read from disk. A failure is reported for that
    /// resource only; its panel keeps the content it had.
    pub async fn refresh_all(&self) -> Vec<(ResourceKey, Result<(), PreviewError>)> {
        let mut results = Vec::new();

        for (key, handle) in self.registry.all() {
            let result = self.refresh(&key, &handle).await;
            if let Err(e) = &result {
                error!(key = %key, "Refresh failed: {}", e);
                self.host
                    .notifier
                    .error(&format!("Could not refresh {}: {}", key, e));
            }
            results.push((key, result));
        }

        results
    }

    async fn refresh(&self, key: &ResourceKey, handle: &PanelHandle) -> Result<(), PreviewError> {
        let html = self
            .render_diagram(handle.resource_path(), handle.asset_root())
            .await?;

        if !self.registry.is_current(key, handle.id()) {
            debug!(key = %key, "Panel replaced during refresh");
            return Ok(());
        }
        handle.surface().set_html(&html)?;
        self.registry.update_html(key, handle.id(), html);
        Ok(())
    }

    async fn render_diagram(&self, path: &Path, asset_root: &Path) -> Result<String, PreviewError> {
        let content = self
            .host
            .files
            .read_to_string(path)
            .await
            .map_err(|source| PreviewError::ResourceRead {
                path: path.to_path_buf(),
                source,
            })?;
        let template = self
            .load_template(asset_root, &self.settings.diagram_template)
            .await?;

        let mut placeholders: Placeholders = PROTOCOL_LABELS
            .iter()
            .map(|(name, label)| (name.to_string(), escape_html(label)))
            .collect();
        placeholders.insert("resourceContent".to_string(), escape_html(&content));
        placeholders.insert(
            "resourceFilePath".to_string(),
            escape_html(&path.display().to_string()),
        );
        placeholders.insert(
            "assetRoot".to_string(),
            escape_html(&asset_root.display().to_string()),
        );

        Ok(self.renderer.render(&template, &placeholders)?)
    }

    fn wire_diagram(&self, key: ResourceKey, id: PanelId, resource_path: PathBuf, mut inbox: PanelInbox) {
        let registry = Arc::clone(&self.registry);
        let buttons = Arc::clone(&self.host.buttons);

        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if !registry.is_current(&key, id) {
                    debug!(key = %key, panel = %id, "Dropping message from replaced panel");
                    break;
                }
                buttons.handle(message, &resource_path);
            }

            if registry.remove_if_current(&key, id) {
                debug!(key = %key, panel = %id, "Diagram panel closed");
            }
        });
    }

    /// Show the login panel, prefilled with the stored settings.
    ///
    /// A previous login panel is closed. Messages from the new panel drive
    /// the login flow in the order they are posted.
    pub async fn show_login_surface(&self, asset_root: &Path) -> Result<PanelId, PreviewError> {
        let result = self.open_login_surface(asset_root).await;
        if let Err(e) = &result {
            error!("Login page failed: {}", e);
            self.host
                .notifier
                .error(&format!("Could not open the login page: {}", e));
        }
        result
    }

    async fn open_login_surface(&self, asset_root: &Path) -> Result<PanelId, PreviewError> {
        let config = ExtensionConfig::load(self.host.settings.as_ref())?;
        let secret = self.stored_client_secret().await;
        let template = self
            .load_template(asset_root, &self.settings.login_template)
            .await?;

        let mut placeholders = Placeholders::new();
        placeholders.insert(
            "clientId".to_string(),
            escape_html(config.client_id.as_deref().unwrap_or_default()),
        );
        placeholders.insert("clientSecret".to_string(), escape_html(secret.expose()));
        placeholders.insert(
            "baseUrl".to_string(),
            escape_html(config.base_url.as_deref().unwrap_or_default()),
        );
        let html = self.renderer.render(&template, &placeholders)?;

        let (surface, inbox) = self.host.panels.create_panel(PanelKind::Login, LOGIN_TITLE)?;
        surface.set_html(&html)?;
        let id = surface.id();
        self.oauth.attach_surface(surface);
        self.wire_login(id, inbox);

        info!(panel = %id, "Opened login page");
        Ok(id)
    }

    fn wire_login(&self, id: PanelId, mut inbox: PanelInbox) {
        let oauth = self.oauth.clone();

        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                // Errors are already reported to the user by the coordinator.
                let _ = oauth.on_host_message(LoginCommand::parse(message)).await;
            }
            oauth.detach_surface(id);
            debug!(panel = %id, "Login panel closed");
        });
    }

    /// Stored client secret, or an empty one if it cannot be read in time.
    async fn stored_client_secret(&self) -> Secret {
        let key = CredentialKey::client_secret();
        match tokio::time::timeout(self.settings.vault_timeout, self.host.vault.get(&key)).await {
            Ok(Ok(Some(secret))) => secret,
            Ok(Ok(None)) => Secret::empty(),
            Ok(Err(e)) => {
                warn!("Could not read the stored client secret: {}", e);
                Secret::empty()
            }
            Err(_) => {
                warn!(
                    "Timed out after {:?} reading the stored client secret",
                    self.settings.vault_timeout
                );
                Secret::empty()
            }
        }
    }

    async fn load_template(&self, asset_root: &Path, name: &str) -> Result<String, TemplateError> {
        let path = asset_root.join(name);
        self.host
            .files
            .read_to_string(&path)
            .await
            .map_err(|source| TemplateError::Missing { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::host::Surface;
    use crate::host::recording::RecordingHost;
    use crate::host::system::FsResourceReader;
    use crate::store::MemoryStore;
    use crate::template::BraceTemplate;
    use tempfile::TempDir;

    fn coordinator(host: &Arc<RecordingHost>) -> PreviewCoordinator {
        let context = host.context(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(FsResourceReader),
        );
        PreviewCoordinator::new(
            context,
            PreviewSettings::default(),
            LoginSettings::default(),
            Arc::new(BraceTemplate::new()),
        )
    }

    fn assets() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("diagram.html"),
            "<pre>{resourceContent}</pre><i>{SAML_REQUEST}</i><b>{resourceFilePath}</b>",
        )
        .unwrap();
        std::fs::write(dir.path().join("authentication.html"), "<p>{clientId}|{clientSecret}|{baseUrl}</p>")
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_preview_renders_resource_into_panel() {
        let host = RecordingHost::new();
        let preview = coordinator(&host);
        let dir = assets();
        let resource = dir.path().join("flow.xml");
        std::fs::write(&resource, "<flow/>").unwrap();

        let key = preview
            .show_resource_preview(&resource, dir.path())
            .await
            .unwrap();

        assert_eq!(key.as_str(), "flow");
        let panel = host.last_panel(PanelKind::Diagram).unwrap();
        assert_eq!(panel.title(), "flow");
        assert!(panel.html().starts_with("<pre><flow/></pre><i>SAML Request</i>"));
        assert!(panel.html().contains(&resource.display().to_string()));
        assert_eq!(preview.registry().get(&key).unwrap().html(), panel.html());
    }

    #[tokio::test]
    async fn test_missing_template_is_reported() {
        let host = RecordingHost::new();
        let preview = coordinator(&host);
        let dir = TempDir::new().unwrap();
        let resource = dir.path().join("flow.xml");
        std::fs::write(&resource, "<flow/>").unwrap();

        let result = preview.show_resource_preview(&resource, dir.path()).await;

        assert!(matches!(
            result,
            Err(PreviewError::Template(TemplateError::Missing { .. }))
        ));
        assert_eq!(host.errors().len(), 1);
        assert!(preview.registry().is_empty());
    }

    #[tokio::test]
    async fn test_panel_creation_failure_is_reported() {
        let host = RecordingHost::new();
        host.fail_panel_creation();
        let preview = coordinator(&host);
        let dir = assets();
        let resource = dir.path().join("flow.xml");
        std::fs::write(&resource, "<flow/>").unwrap();

        let result = preview.show_resource_preview(&resource, dir.path()).await;

        assert!(matches!(result, Err(PreviewError::Host(_))));
        assert!(preview.registry().is_empty());
    }

    #[tokio::test]
    async fn test_login_surface_renders_empty_defaults() {
        let host = RecordingHost::new();
        let preview = coordinator(&host);
        let dir = assets();

        let id = preview.show_login_surface(dir.path()).await.unwrap();

        let panel = host.last_panel(PanelKind::Login).unwrap();
        assert_eq!(panel.id(), id);
        assert_eq!(panel.title(), LOGIN_TITLE);
        assert_eq!(panel.html(), "<p>||</p>");
    }
}
