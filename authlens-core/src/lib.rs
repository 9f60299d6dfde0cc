//! # Authlens Core
//!
//! Core library for the authlens identity protocol debugger.
//!
//! This crate provides:
//! - A registry of open diagram panels, one per resource
//! - Template rendering for diagram and login pages
//! - Secret storage backed by the OS credential vault
//! - The identity provider login flow with its loopback redirect listener
//! - [`PreviewCoordinator`], the façade the host's commands call
//!
//! Everything the library needs from its embedding application is passed in
//! through a [`HostContext`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use authlens_core::{BraceTemplate, HostContext, LoginSettings, PreviewCoordinator, PreviewSettings};
//!
//! async fn preview(host: HostContext) -> Result<(), authlens_core::PreviewError> {
//!     let preview = PreviewCoordinator::new(
//!         host,
//!         PreviewSettings::default(),
//!         LoginSettings::default(),
//!         Arc::new(BraceTemplate::new()),
//!     );
//!     let key = preview
//!         .show_resource_preview(Path::new("flows/My%20Service.xml"), Path::new("assets"))
//!         .await?;
//!     assert_eq!(key.as_str(), "My Service");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod oauth;
pub mod preview;
pub mod registry;
pub mod store;
pub mod template;

// Re-export commonly used types at crate root
pub use model::{
    CredentialKey,
    PanelId,
    ResourceKey,
};

pub use store::{
    MemoryStore,
    Secret,
    SecretStore,
    VaultError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use config::{
    ConfigError,
    ConfigStore,
    ExtensionConfig,
    FileConfigStore,
    MemoryConfigStore,
};

pub use template::{
    escape_html,
    BraceTemplate,
    Placeholders,
    TemplateError,
    TemplateRenderer,
    UnresolvedPolicy,
};

pub use host::{
    HostContext,
    HostError,
    PanelHost,
    PanelInbox,
    PanelKind,
    Surface,
};

pub use registry::{
    PanelHandle,
    PanelRegistry,
};

pub use oauth::{
    LoginCommand,
    LoginError,
    LoginRequest,
    LoginSettings,
    LoginState,
    OAuthFlowCoordinator,
};

pub use preview::{
    PreviewCoordinator,
    PreviewError,
    PreviewSettings,
};

pub use error::AuthlensError;
