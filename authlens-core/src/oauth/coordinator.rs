//! Login flow coordinator.
//!
//! [`OAuthFlowCoordinator`] owns the single login slot. A login starts with
//! [`start_login`](OAuthFlowCoordinator::start_login), which binds the
//! loopback listener, opens the browser and waits for the redirect in a
//! background task. The login panel then drives the rest of the flow through
//! [`on_host_message`](OAuthFlowCoordinator::on_host_message).
//!
//! The slot lock is never held across an `.await`: every await point is
//! followed by a re-check that the session it started with is still current.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::capture::{CaptureError, CapturedRedirect, RedirectCaptureServer};
use super::command::LoginCommand;
use super::session::{LoginFailure, LoginRequest, LoginState, OAuthSession};
use super::{
    DEFAULT_CAPTURE_TIMEOUT, DEFAULT_REDIRECT_PATH, DEFAULT_REDIRECT_PORT, LoginError,
    authorization_url,
};
use crate::config::ExtensionConfig;
use crate::host::{HostContext, Notifier, Surface};
use crate::model::{CredentialKey, PanelId};
use crate::store::Secret;

/// Message shown once the access token is stored.
pub const CONFIGURATION_SUCCESS: &str = "Identity server configuration completed successfully.";

/// Where and for how long the redirect is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSettings {
    /// Loopback port of the redirect URI. 0 picks an ephemeral port.
    pub redirect_port: u16,

    /// Path of the redirect URI.
    pub redirect_path: String,

    /// Bound on the whole attempt: redirect plus access token.
    pub capture_timeout: Duration,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            redirect_port: DEFAULT_REDIRECT_PORT,
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct SessionSlot {
    state: LoginState,
    session: Option<OAuthSession>,
    capture: Option<JoinHandle<()>>,
    surface: Option<Arc<dyn Surface>>,
}

impl SessionSlot {
    fn is_current(&self, session_id: Uuid) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    /// Drop the session and stop its listener.
    ///
    /// The aborted capture handle stays in the slot so the next
    /// `start_login` can wait for the port to be released.
    fn end_session(&mut self) {
        self.session = None;
        if let Some(capture) = &self.capture {
            capture.abort();
        }
    }

    /// Fail a session whose deadline has passed.
    ///
    /// Returns whether a session was expired.
    fn expire(&mut self) -> bool {
        let expired = self
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()));
        if expired {
            warn!("Login session expired without receiving credentials");
            self.state = LoginState::Failed(LoginFailure::RedirectTimeout);
            self.end_session();
        }
        expired
    }
}

/// Drives the login flow and persists its results.
///
/// Cheap to clone; clones share the same login slot.
#[derive(Debug, Clone)]
pub struct OAuthFlowCoordinator {
    host: HostContext,
    settings: LoginSettings,
    slot: Arc<Mutex<SessionSlot>>,
}

impl OAuthFlowCoordinator {
    /// Create a coordinator with an idle login slot.
    pub fn new(host: HostContext, settings: LoginSettings) -> Self {
        Self {
            host,
            settings,
            slot: Arc::new(Mutex::new(SessionSlot::default())),
        }
    }

    /// Redirect and timeout settings.
    pub fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    /// Current state of the login flow.
    pub fn state(&self) -> LoginState {
        let (state, expired) = {
            let mut slot = self.slot.lock();
            let expired = slot.expire();
            (slot.state.clone(), expired)
        };
        if expired {
            notify_timeout(self.host.notifier.as_ref());
        }
        state
    }

    /// The running login attempt, if any.
    pub fn active_session(&self) -> Option<OAuthSession> {
        let (session, expired) = {
            let mut slot = self.slot.lock();
            let expired = slot.expire();
            (slot.session.clone(), expired)
        };
        if expired {
            notify_timeout(self.host.notifier.as_ref());
        }
        session
    }

    /// Make `surface` the login surface, closing the one it replaces.
    pub fn attach_surface(&self, surface: Arc<dyn Surface>) {
        let id = surface.id();
        let previous = self.slot.lock().surface.replace(surface);
        if let Some(previous) = previous.filter(|p| p.id() != id) {
            debug!(panel = %previous.id(), "Closing replaced login surface");
            previous.close();
        }
    }

    /// Forget the login surface `id` after it was closed.
    pub fn detach_surface(&self, id: PanelId) {
        let mut slot = self.slot.lock();
        if slot.surface.as_ref().is_some_and(|s| s.id() == id) {
            slot.surface = None;
        }
    }

    /// Start a login attempt.
    ///
    /// Fails with [`LoginError::SessionInProgress`] while another attempt is
    /// running; that attempt and its listener are left alone. An attempt past
    /// its deadline is failed and replaced.
    pub async fn start_login(&self, request: LoginRequest) -> Result<Uuid, LoginError> {
        let in_progress = self.active_session().is_some();
        let (session_id, previous_capture) = {
            let mut slot = self.slot.lock();
            if in_progress || slot.session.is_some() {
                warn!("Rejecting login: another login is in progress");
                return Err(LoginError::SessionInProgress);
            }

            let session = OAuthSession::new(
                request,
                self.settings.redirect_port,
                &self.settings.redirect_path,
                self.settings.capture_timeout,
                Utc::now(),
            );
            let id = session.id;
            slot.session = Some(session);
            (id, slot.capture.take())
        };

        if let Some(capture) = previous_capture {
            capture.abort();
            let _ = capture.await;
        }

        match self.launch(session_id).await {
            Ok(()) => Ok(session_id),
            Err(e) => {
                let mut slot = self.slot.lock();
                if slot.is_current(session_id) {
                    slot.state = LoginState::Failed(LoginFailure::from(&e));
                    slot.end_session();
                }
                Err(e)
            }
        }
    }

    async fn launch(&self, session_id: Uuid) -> Result<(), LoginError> {
        let server =
            RedirectCaptureServer::bind(self.settings.redirect_port, &self.settings.redirect_path)
                .await?;

        let (url, state) = {
            let mut slot = self.slot.lock();
            let session = slot
                .session
                .as_mut()
                .filter(|s| s.id == session_id)
                .ok_or(LoginError::Cancelled)?;
            session.bound_to(server.port());
            authorization_url(&session.base_url, &session.client_id, &session.redirect_uri)?
        };

        self.host.urls.open(&url)?;
        self.transition(session_id, LoginState::BrowserLaunched);
        info!(session = %session_id, port = server.port(), "Opened authorization page");

        self.transition(session_id, LoginState::AwaitingRedirect);

        let slot = Arc::clone(&self.slot);
        let notifier = Arc::clone(&self.host.notifier);
        let timeout = self.settings.capture_timeout;
        let expected_state = state.secret().clone();
        let capture = tokio::spawn(async move {
            let outcome = tokio::time::timeout(timeout, server.capture(&expected_state)).await;
            finish_capture(&slot, notifier.as_ref(), session_id, outcome);
        });

        let mut slot = self.slot.lock();
        if slot.is_current(session_id) {
            slot.capture = Some(capture);
        } else {
            capture.abort();
        }
        Ok(())
    }

    fn transition(&self, session_id: Uuid, state: LoginState) {
        let mut slot = self.slot.lock();
        if slot.is_current(session_id) {
            debug!(session = %session_id, ?state, "Login state changed");
            slot.state = state;
        }
    }

    /// Act on a message from the login panel.
    ///
    /// Errors are shown to the user before they are returned.
    pub async fn on_host_message(&self, command: LoginCommand) -> Result<(), LoginError> {
        let result = match command {
            LoginCommand::Login {
                base_url,
                client_id,
                client_secret,
            } => self.receive_login(base_url, client_id, client_secret).await,
            LoginCommand::Access { access_token } => self.receive_access(access_token).await,
            LoginCommand::Ignored => {
                debug!("Ignoring login panel message");
                return Ok(());
            }
        };

        if let Err(e) = &result {
            error!("Login failed: {}", e);
            self.host.notifier.error(&format!("Login failed: {}", e));
        }
        result
    }

    async fn receive_login(
        &self,
        base_url: String,
        client_id: String,
        client_secret: Secret,
    ) -> Result<(), LoginError> {
        if self.active_session().is_some() {
            return Err(LoginError::SessionInProgress);
        }

        info!(%client_id, "Saving identity provider settings");
        ExtensionConfig::save(self.host.settings.as_ref(), &base_url, &client_id)?;

        if let Err(e) = self
            .host
            .vault
            .set(&CredentialKey::client_secret(), &client_secret)
            .await
        {
            self.fail_current(LoginFailure::Vault(e.to_string()));
            return Err(e.into());
        }

        self.start_login(LoginRequest::new(base_url, client_id, client_secret))
            .await
            .map(|_| ())
    }

    async fn receive_access(&self, access_token: Secret) -> Result<(), LoginError> {
        self.slot.lock().state = LoginState::CredentialsReceived;

        if let Err(e) = self
            .host
            .vault
            .set(&CredentialKey::access_token(), &access_token)
            .await
        {
            self.fail_current(LoginFailure::Vault(e.to_string()));
            return Err(e.into());
        }

        let surface = {
            let mut slot = self.slot.lock();
            slot.state = LoginState::Persisted;
            slot.end_session();
            slot.surface.take()
        };
        if let Some(surface) = surface {
            surface.close();
        }

        info!("Access token stored");
        self.host.notifier.info(CONFIGURATION_SUCCESS);
        Ok(())
    }

    fn fail_current(&self, failure: LoginFailure) {
        let mut slot = self.slot.lock();
        slot.state = LoginState::Failed(failure);
        slot.end_session();
    }
}

fn finish_capture(
    slot: &Mutex<SessionSlot>,
    notifier: &dyn Notifier,
    session_id: Uuid,
    outcome: Result<Result<CapturedRedirect, CaptureError>, Elapsed>,
) {
    let mut guard = slot.lock();
    if !guard.is_current(session_id) {
        debug!(session = %session_id, "Discarding redirect for a finished login");
        return;
    }
    guard.capture = None;

    match outcome {
        Ok(Ok(redirect)) => {
            let mut message = json!({"command": "CODE", "code": redirect.code.expose()});
            if let Some(session) = guard.session.as_mut() {
                message["redirectUri"] = json!(session.redirect_uri);
                session.code = Some(redirect.code);
            }
            guard.state = LoginState::CodeCaptured;
            let surface = guard.surface.clone();
            drop(guard);

            info!(session = %session_id, "Authorization code captured");
            if let Some(surface) = surface {
                if let Err(e) = surface.post_message(&message) {
                    warn!("Could not hand the authorization code to the login page: {}", e);
                }
            }
        }
        Ok(Err(e)) => {
            guard.state = LoginState::Failed(LoginFailure::Capture(e.to_string()));
            guard.session = None;
            drop(guard);

            error!(session = %session_id, "Redirect capture failed: {}", e);
            notifier.error(&format!("Login failed: {}", LoginError::Capture(e)));
        }
        Err(_) => {
            guard.state = LoginState::Failed(LoginFailure::RedirectTimeout);
            guard.session = None;
            drop(guard);

            error!(session = %session_id, "No redirect received before the deadline");
            notify_timeout(notifier);
        }
    }
}

fn notify_timeout(notifier: &dyn Notifier) {
    notifier.error(&format!("Login failed: {}", LoginError::RedirectTimeout));
}
