//! Secure credential storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for vault backends, addressed by [`CredentialKey`]
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select backend based on availability
//!
//! There is no cache in front of a store: every read goes to the backend,
//! and every write is a single backend call per key.
//!
//! # Example
//!
//! ```rust,ignore
//! use authlens_core::{CredentialKey, store::{Secret, SecretStore, create_store}};
//!
//! let store = create_store(true); // Prefer keyring if available
//!
//! store.set(&CredentialKey::access_token(), &Secret::new("tok123")).await?;
//! let token = store.get(&CredentialKey::access_token()).await?;
//! assert_eq!(token.unwrap().expose(), "tok123");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::model::CredentialKey;

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// An empty secret, used where a value is optional for display.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for vault operations.
///
/// Variants name the credential key but never carry the secret value.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The OS denied access to the entry (locked keychain, revoked permission).
    #[error("access denied to credential {key}")]
    AccessDenied { key: String },

    /// The vault backend is not available on this system.
    #[error("credential vault not available: {message}")]
    Unavailable { message: String },

    /// The storage backend encountered an error.
    #[error("vault backend error for {key}: {message}")]
    Backend { key: String, message: String },
}

/// Abstraction over OS credential vault backends.
///
/// Implementations include:
/// - [`MemoryStore`] - In-memory storage for testing
/// - [`KeyringStore`] (with `keyring-store` feature) - OS keyring
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret.
    ///
    /// Returns `Ok(None)` if no entry exists for the key.
    async fn get(&self, key: &CredentialKey) -> Result<Option<Secret>, VaultError>;

    /// Store a secret, overwriting any existing value.
    async fn set(&self, key: &CredentialKey, secret: &Secret) -> Result<(), VaultError>;

    /// Delete a secret.
    ///
    /// Returns `Ok(())` even if the entry didn't exist.
    async fn delete(&self, key: &CredentialKey) -> Result<(), VaultError>;

    /// Check if an entry exists without handing out its value.
    async fn exists(&self, key: &CredentialKey) -> Result<bool, VaultError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Create a secret store with automatic backend selection.
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   a [`KeyringStore`] is returned when the platform keyring is reachable.
/// - Otherwise, or when the keyring is unavailable, a [`MemoryStore`] is
///   returned and a warning is logged, since secrets will not survive a restart.
pub fn create_store(prefer_keyring: bool) -> Box<dyn SecretStore> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new() {
            Ok(store) => {
                tracing::info!("Using OS keyring for secret storage");
                return Box::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory store. \
                     Secrets will not persist across restarts.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            "Keyring storage requested but keyring-store feature not enabled. \
             Using memory store. Secrets will not persist across restarts."
        );
    }

    tracing::debug!("Using in-memory secret storage");
    Box::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_deserializes_from_plain_string() {
        let secret: Secret = serde_json::from_str("\"s3cr3t\"").unwrap();
        assert_eq!(secret.expose(), "s3cr3t");
    }

    #[test]
    fn test_vault_error_does_not_leak_value() {
        let err = VaultError::Backend {
            key: CredentialKey::access_token().to_string(),
            message: "platform failure".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("ACCESS_TOKEN/ACCESS_TOKEN"));
        assert!(!text.contains("tok123"));
    }

    #[tokio::test]
    async fn test_create_store_memory_fallback() {
        let store = create_store(false);

        let key = CredentialKey::new("authlens-test", "memory");
        store.set(&key, &Secret::new("test")).await.unwrap();
        let retrieved = store.get(&key).await.unwrap();
        assert_eq!(retrieved, Some(Secret::new("test")));
    }
}
