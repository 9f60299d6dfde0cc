//! Top-level error type for authlens.

use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::oauth::{CaptureError, LoginError};
use crate::preview::PreviewError;
use crate::store::VaultError;
use crate::template::TemplateError;

/// Top-level error type encompassing all authlens errors.
#[derive(Debug, Error)]
pub enum AuthlensError {
    /// Error from the credential vault.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Error from the settings store.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from template rendering.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Error from a host capability.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Error from the redirect listener.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Error from the login flow.
    #[error("login error: {0}")]
    Login(#[from] LoginError),

    /// Error from a preview operation.
    #[error("preview error: {0}")]
    Preview(#[from] PreviewError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PanelId;

    #[test]
    fn test_conversions_keep_the_source_message() {
        let err: AuthlensError = LoginError::SessionInProgress.into();
        assert_eq!(err.to_string(), "login error: a login is already in progress");

        let id = PanelId::new();
        let err: AuthlensError = HostError::Closed(id).into();
        assert_eq!(err.to_string(), format!("host error: panel {} is closed", id));
    }
}
