//! In-memory secret storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Secret, SecretStore, VaultError};
use crate::model::CredentialKey;

/// In-memory secret store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<CredentialKey, Secret>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store with initial data.
    pub fn with_data(data: HashMap<CredentialKey, Secret>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys_count", &self.data.read().len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &CredentialKey) -> Result<Option<Secret>, VaultError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &CredentialKey, secret: &Secret) -> Result<(), VaultError> {
        self.data.write().insert(key.clone(), secret.clone());
        Ok(())
    }

    async fn delete(&self, key: &CredentialKey) -> Result<(), VaultError> {
        self.data.write().remove(key);
        Ok(())
    }
}
