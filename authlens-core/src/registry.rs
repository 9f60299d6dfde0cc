//! Registry of open preview panels.
//!
//! Holds at most one [`PanelHandle`] per [`ResourceKey`]. Showing a resource
//! again replaces the entry; the replaced surface is left to the host, which
//! owns its teardown. A panel closing removes its own entry through
//! [`PanelRegistry::remove_if_current`], which never touches a newer panel
//! registered under the same key.
//!
//! The lock is only held for the duration of a single map operation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::host::Surface;
use crate::model::{PanelId, ResourceKey};

/// A registered rendering surface and what was last rendered into it.
#[derive(Clone)]
pub struct PanelHandle {
    surface: Arc<dyn Surface>,
    html: Arc<str>,
    resource_path: PathBuf,
    asset_root: PathBuf,
}

impl PanelHandle {
    /// Create a handle for a surface showing `resource_path`.
    pub fn new(
        surface: Arc<dyn Surface>,
        html: impl Into<Arc<str>>,
        resource_path: impl Into<PathBuf>,
        asset_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            surface,
            html: html.into(),
            resource_path: resource_path.into(),
            asset_root: asset_root.into(),
        }
    }

    /// Identity of the underlying surface.
    pub fn id(&self) -> PanelId {
        self.surface.id()
    }

    /// The underlying surface.
    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    /// Last rendered HTML.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Resource shown in the panel.
    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    /// Asset root the panel was rendered against.
    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }
}

impl fmt::Debug for PanelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelHandle")
            .field("id", &self.id())
            .field("resource_path", &self.resource_path)
            .field("html_len", &self.html.len())
            .finish()
    }
}

/// Mapping from resource key to its single live panel.
#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: RwLock<HashMap<ResourceKey, PanelHandle>>,
}

impl PanelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `key`, replacing any existing entry.
    ///
    /// Returns the replaced handle, if any.
    pub fn upsert(&self, key: ResourceKey, handle: PanelHandle) -> Option<PanelHandle> {
        let previous = self.panels.write().insert(key.clone(), handle);
        if let Some(old) = &previous {
            tracing::debug!(key = %key, replaced = %old.id(), "Replaced panel");
        }
        previous
    }

    /// Current handle for `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<PanelHandle> {
        self.panels.read().get(key).cloned()
    }

    /// Snapshot of every entry.
    pub fn all(&self) -> HashMap<ResourceKey, PanelHandle> {
        self.panels.read().clone()
    }

    /// Whether the panel registered for `key` is `id`.
    pub fn is_current(&self, key: &ResourceKey, id: PanelId) -> bool {
        self.panels
            .read()
            .get(key)
            .is_some_and(|handle| handle.id() == id)
    }

    /// Remove the entry for `key` only if it still belongs to panel `id`.
    ///
    /// Returns whether an entry was removed.
    pub fn remove_if_current(&self, key: &ResourceKey, id: PanelId) -> bool {
        let mut panels = self.panels.write();
        if panels.get(key).is_some_and(|handle| handle.id() == id) {
            panels.remove(key);
            true
        } else {
            false
        }
    }

    /// Record new HTML for `key` if its entry still belongs to panel `id`.
    ///
    /// Returns whether the entry was updated.
    pub fn update_html(&self, key: &ResourceKey, id: PanelId, html: impl Into<Arc<str>>) -> bool {
        let mut panels = self.panels.write();
        match panels.get_mut(key) {
            Some(handle) if handle.id() == id => {
                handle.html = html.into();
                true
            }
            _ => false,
        }
    }

    /// Number of registered panels.
    pub fn len(&self) -> usize {
        self.panels.read().len()
    }

    /// Whether no panel is registered.
    pub fn is_empty(&self) -> bool {
        self.panels.read().is_empty()
    }
}
