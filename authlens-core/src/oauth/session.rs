//! Login attempt state.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::{LoginError, redirect_uri, scope_string};
use crate::store::Secret;

/// Why a login attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// Nothing arrived before the deadline.
    RedirectTimeout,

    /// The credential vault refused a read or write.
    Vault(String),

    /// The loopback listener failed or the provider returned an error.
    Capture(String),

    /// Anything else: settings, URLs, the browser.
    Other(String),
}

impl From<&LoginError> for LoginFailure {
    fn from(err: &LoginError) -> Self {
        match err {
            LoginError::RedirectTimeout => Self::RedirectTimeout,
            LoginError::Vault(e) => Self::Vault(e.to_string()),
            LoginError::Capture(e) => Self::Capture(e.to_string()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Where the login flow currently is.
///
/// ```text
/// Idle -> BrowserLaunched -> AwaitingRedirect -> CodeCaptured
///      -> CredentialsReceived -> Persisted
/// any -> Failed(reason)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginState {
    #[default]
    Idle,
    BrowserLaunched,
    AwaitingRedirect,
    CodeCaptured,
    CredentialsReceived,
    Persisted,
    Failed(LoginFailure),
}

impl LoginState {
    /// Whether the attempt is over, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Failed(_))
    }
}

/// What a login attempt needs from the user's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret,
}

impl LoginRequest {
    /// Create a request from explicit values.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }
}

/// One login attempt.
///
/// Lives from `start_login` until the token is persisted, the attempt
/// fails, or its deadline passes.
#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub id: Uuid,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret,
    pub scope: String,
    pub redirect_uri: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub code: Option<Secret>,
    redirect_path: String,
}

impl OAuthSession {
    pub(crate) fn new(
        request: LoginRequest,
        port: u16,
        redirect_path: &str,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            id: Uuid::new_v4(),
            base_url: request.base_url,
            client_id: request.client_id,
            client_secret: request.client_secret,
            scope: scope_string(),
            redirect_uri: redirect_uri(port, redirect_path),
            port,
            started_at: now,
            deadline: now + timeout,
            code: None,
            redirect_path: redirect_path.to_string(),
        }
    }

    /// Record the port the listener actually bound.
    pub(crate) fn bound_to(&mut self, port: u16) {
        self.port = port;
        self.redirect_uri = redirect_uri(port, &self.redirect_path);
    }

    /// Whether the attempt has outlived its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LoginRequest {
        LoginRequest::new("https://idp.example", "abc", Secret::new("s3cr3t"))
    }

    #[test]
    fn test_session_deadline() {
        let now = Utc::now();
        let session = OAuthSession::new(request(), 8010, "/callback", Duration::from_secs(60), now);

        assert_eq!(session.redirect_uri, "http://localhost:8010/callback");
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_bound_port_updates_redirect_uri() {
        let mut session =
            OAuthSession::new(request(), 0, "/callback", Duration::from_secs(60), Utc::now());
        session.bound_to(53124);
        assert_eq!(session.port, 53124);
        assert_eq!(session.redirect_uri, "http://localhost:53124/callback");
    }

    #[test]
    fn test_terminal_states() {
        assert!(LoginState::Persisted.is_terminal());
        assert!(LoginState::Failed(LoginFailure::RedirectTimeout).is_terminal());
        assert!(!LoginState::AwaitingRedirect.is_terminal());
        assert!(!LoginState::Idle.is_terminal());
    }

    #[test]
    fn test_debug_hides_client_secret() {
        let session =
            OAuthSession::new(request(), 8010, "/callback", Duration::from_secs(60), Utc::now());
        assert!(!format!("{:?}", session).contains("s3cr3t"));
    }
}
