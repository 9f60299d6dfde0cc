//! Domain model types for authlens.
//!
//! This module defines the identifiers shared across the crate:
//! - [`ResourceKey`] - Identity of a previewed resource in the panel registry
//! - [`CredentialKey`] - (service, account) pair addressing a vault entry
//! - [`PanelId`] - Identity of a single rendering surface

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Normalized identifier for a previewed resource.
///
/// Derived from the resource's file name without its extension. The only
/// escape that is decoded is `%20`, which becomes a space; every other
/// character is kept as it appears in the file name.
///
/// # Examples
///
/// ```
/// use authlens_core::ResourceKey;
/// use std::path::Path;
///
/// let key = ResourceKey::from_path(Path::new("/flows/My%20Service.xml"));
/// assert_eq!(key.as_str(), "My Service");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a key from an already-normalized name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the key for a resource path.
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(stem.replace("%20", " "))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Address of a secret in the OS credential vault.
///
/// Only a single identity is active at a time, so the two keys used by the
/// login flow are fixed constants rather than per-user namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    /// Vault service name.
    pub service: String,

    /// Vault account name.
    pub account: String,
}

impl CredentialKey {
    /// Service and account name of the stored client secret.
    pub const CLIENT_SECRET: &'static str = "CLIENT_SECRET";

    /// Service and account name of the stored access token.
    pub const ACCESS_TOKEN: &'static str = "ACCESS_TOKEN";

    /// Create a key from a service and account name.
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// Key under which the OAuth client secret is stored.
    pub fn client_secret() -> Self {
        Self::new(Self::CLIENT_SECRET, Self::CLIENT_SECRET)
    }

    /// Key under which the access token is stored.
    pub fn access_token() -> Self {
        Self::new(Self::ACCESS_TOKEN, Self::ACCESS_TOKEN)
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.account)
    }
}

/// Identity of one rendering surface.
///
/// A fresh id is minted for every panel, so two panels shown for the same
/// resource key can always be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId(Uuid);

impl PanelId {
    /// Mint a new random panel id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PanelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_resource_key_decodes_spaces() {
        let key = ResourceKey::from_path(Path::new("/work/flows/My%20Service.xml"));
        assert_eq!(key.as_str(), "My Service");
    }

    #[test]
    fn test_resource_key_decodes_every_space() {
        let key = ResourceKey::from_path(Path::new("A%20B%20C.xml"));
        assert_eq!(key.as_str(), "A B C");
    }

    #[test]
    fn test_resource_key_keeps_other_escapes() {
        let key = ResourceKey::from_path(Path::new("a%2Fb.xml"));
        assert_eq!(key.as_str(), "a%2Fb");
    }

    #[test]
    fn test_resource_key_without_extension() {
        let key = ResourceKey::from_path(&PathBuf::from("flows/login"));
        assert_eq!(key.as_str(), "login");
    }

    #[test]
    fn test_credential_keys_are_fixed() {
        let secret = CredentialKey::client_secret();
        assert_eq!(secret.service, "CLIENT_SECRET");
        assert_eq!(secret.account, "CLIENT_SECRET");

        let token = CredentialKey::access_token();
        assert_eq!(token.to_string(), "ACCESS_TOKEN/ACCESS_TOKEN");
    }

    #[test]
    fn test_panel_ids_are_unique() {
        assert_ne!(PanelId::new(), PanelId::new());
    }
}
