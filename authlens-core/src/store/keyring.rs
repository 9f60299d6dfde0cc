//! OS keyring-backed secret storage implementation.

use async_trait::async_trait;
use keyring::Entry;

use super::{Secret, SecretStore, VaultError};
use crate::model::CredentialKey;

/// OS keyring-backed secret store.
///
/// This store uses the platform's native keyring service:
/// - macOS: Keychain
/// - Linux: kernel keyutils
/// - Windows: Credential Manager
///
/// A [`CredentialKey`] maps one-to-one onto a keyring entry: its service
/// name becomes the entry's service and its account name the entry's user.
/// Keyring calls block, so each one runs on the blocking thread pool.
///
/// # Example
///
/// ```rust,ignore
/// use authlens_core::{CredentialKey, store::{KeyringStore, SecretStore, Secret}};
///
/// let store = KeyringStore::try_new()?;
/// store.set(&CredentialKey::access_token(), &Secret::new("tok123")).await?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeyringStore {
    _private: (),
}

impl KeyringStore {
    /// Try to create a new keyring store.
    ///
    /// Returns an error if the keyring backend is not available on this platform.
    pub fn try_new() -> Result<Self, VaultError> {
        match Entry::new("authlens", "availability_check") {
            Ok(_) => Ok(Self { _private: () }),
            Err(e) => Err(VaultError::Unavailable {
                message: format!("keyring backend not available: {}", e),
            }),
        }
    }
}

/// Run a keyring operation against the entry for `key` off the async runtime.
async fn with_entry<T, F>(key: &CredentialKey, op: F) -> Result<T, VaultError>
where
    T: Send + 'static,
    F: FnOnce(Entry) -> Result<T, keyring::Error> + Send + 'static,
{
    let service = key.service.clone();
    let account = key.account.clone();
    let label = key.to_string();

    let joined = tokio::task::spawn_blocking(move || {
        let entry = Entry::new(&service, &account)?;
        op(entry)
    })
    .await;

    match joined {
        Ok(result) => result.map_err(|e| map_keyring_error(&label, e)),
        Err(join_err) => {
            tracing::error!(key = %label, "keyring task did not complete");
            Err(VaultError::Backend {
                key: label,
                message: if join_err.is_panic() {
                    "keyring task panicked".to_string()
                } else {
                    "keyring task cancelled".to_string()
                },
            })
        }
    }
}

fn map_keyring_error(key: &str, err: keyring::Error) -> VaultError {
    match err {
        keyring::Error::NoStorageAccess(_) => VaultError::AccessDenied {
            key: key.to_string(),
        },
        keyring::Error::Ambiguous(_) => VaultError::Backend {
            key: key.to_string(),
            message: "ambiguous keyring entry".to_string(),
        },
        keyring::Error::Invalid(attr, reason) => VaultError::Backend {
            key: key.to_string(),
            message: format!("invalid keyring attribute {}: {}", attr, reason),
        },
        keyring::Error::PlatformFailure(e) => VaultError::Backend {
            key: key.to_string(),
            message: format!("platform keyring failure: {}", e),
        },
        keyring::Error::BadEncoding(_) => VaultError::Backend {
            key: key.to_string(),
            message: "stored value is not valid UTF-8".to_string(),
        },
        e => VaultError::Backend {
            key: key.to_string(),
            message: format!("keyring error: {}", e),
        },
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &CredentialKey) -> Result<Option<Secret>, VaultError> {
        with_entry(key, |entry| match entry.get_password() {
            Ok(password) => Ok(Some(Secret::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &CredentialKey, secret: &Secret) -> Result<(), VaultError> {
        let secret = secret.clone();
        with_entry(key, move |entry| entry.set_password(secret.expose())).await
    }

    async fn delete(&self, key: &CredentialKey) -> Result<(), VaultError> {
        with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
