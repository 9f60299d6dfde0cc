//! Identity provider login.
//!
//! The login is an OAuth 2.0 authorization code flow in which the token
//! exchange happens inside the browser-hosted login page, not here. This
//! module covers everything around it:
//! - [`authorization_url`] - builds the URL the system browser is sent to
//! - [`capture`] - one-shot loopback listener that receives the redirect
//! - [`command`] - messages the login panel posts back
//! - [`session`] - per-attempt state and the login state machine
//! - [`coordinator`] - drives the flow and persists the results

pub mod capture;
pub mod command;
pub mod coordinator;
pub mod session;

use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope, basic::BasicClient};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::store::VaultError;

pub use capture::{CaptureError, CapturedRedirect, RedirectCaptureServer};
pub use command::LoginCommand;
pub use coordinator::{LoginSettings, OAuthFlowCoordinator};
pub use session::{LoginFailure, LoginRequest, LoginState, OAuthSession};

/// Permissions requested on every login.
pub const SCOPES: [&str; 5] = [
    "internal_application_mgt_create",
    "internal_application_mgt_delete",
    "internal_application_mgt_update",
    "internal_application_mgt_view",
    "internal_functional_lib_view",
];

/// Loopback port the redirect is captured on.
pub const DEFAULT_REDIRECT_PORT: u16 = 8010;

/// Path of the loopback redirect URI.
pub const DEFAULT_REDIRECT_PATH: &str = "/callback";

/// How long a login attempt may wait for the redirect and the access token.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(300);

/// Error type for the login flow.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Another login attempt is still running.
    #[error("a login is already in progress")]
    SessionInProgress,

    /// The attempt ended before the redirect or the token arrived.
    #[error("login timed out waiting for the identity provider")]
    RedirectTimeout,

    /// The attempt was ended while it was starting.
    #[error("login was cancelled before the browser was opened")]
    Cancelled,

    /// The credential vault failed.
    #[error("credential vault error: {0}")]
    Vault(#[from] VaultError),

    /// The settings store failed.
    #[error("settings error: {0}")]
    Config(#[from] ConfigError),

    /// The redirect listener failed.
    #[error("redirect capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// A URL could not be built from the configured values.
    #[error("invalid {what} URL: {message}")]
    InvalidUrl { what: &'static str, message: String },

    /// A host capability failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// The space-separated scope string sent to the provider.
pub fn scope_string() -> String {
    SCOPES.join(" ")
}

/// Loopback redirect URI for `port` and `path`.
pub fn redirect_uri(port: u16, path: &str) -> String {
    format!("http://localhost:{}{}", port, path)
}

/// Build the authorization URL and the CSRF state it carries.
///
/// The URL is `{base_url}/authorize` with `response_type=code`, the client
/// id, a random `state`, the redirect URI and the fixed scopes, all
/// form-urlencoded.
pub fn authorization_url(
    base_url: &str,
    client_id: &str,
    redirect_uri: &str,
) -> Result<(Url, CsrfToken), LoginError> {
    let auth_url = AuthUrl::new(format!("{}/authorize", base_url.trim_end_matches('/')))
        .map_err(|e| LoginError::InvalidUrl {
            what: "authorization",
            message: e.to_string(),
        })?;

    let redirect_url =
        RedirectUrl::new(redirect_uri.to_string()).map_err(|e| LoginError::InvalidUrl {
            what: "redirect",
            message: e.to_string(),
        })?;

    let client = BasicClient::new(ClientId::new(client_id.to_string()), None, auth_url, None)
        .set_redirect_uri(redirect_url);

    let mut request = client.authorize_url(CsrfToken::new_random);
    for scope in SCOPES {
        request = request.add_scope(Scope::new(scope.to_string()));
    }

    Ok(request.url())
}
