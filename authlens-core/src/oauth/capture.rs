//! One-shot loopback listener for the authorization redirect.
//!
//! The listener is bound before the browser is opened and lives until
//! [`RedirectCaptureServer::capture`] returns. `capture` consumes the server,
//! so the port is released on every exit path.
//!
//! Each accepted connection is served on its own task, so a browser's idle
//! preconnect cannot hold up the redirect that follows it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use url::Url;

use crate::store::Secret;

const SUCCESS_HTML: &str = "<html><body><h1>Authentication successful</h1>\
    <p>You can close this window and return to authlens.</p></body></html>";
const FAILURE_HTML: &str = "<html><body><h1>Authentication failed</h1>\
    <p>You can close this window and start the login again.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not Found</h1></body></html>";
const BAD_REQUEST_HTML: &str = "<html><body><h1>Bad Request</h1></body></html>";

/// How long a connection may stay silent before it is dropped.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for redirect capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The loopback port could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener stopped accepting connections.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// The provider redirected with an OAuth error.
    #[error("identity provider returned {error}")]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// The `state` parameter was missing or did not match.
    #[error("state parameter mismatch")]
    StateMismatch,
}

/// The part of the redirect the login flow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRedirect {
    /// Authorization code issued by the provider.
    pub code: Secret,
}

/// Loopback HTTP listener waiting for a single redirect.
#[derive(Debug)]
pub struct RedirectCaptureServer {
    listener: TcpListener,
    listener_v6: Option<TcpListener>,
    path: String,
}

/// What one request to the listener turned out to be.
enum Outcome {
    Captured(CapturedRedirect),
    Failed(CaptureError),
    NotFound,
    BadRequest,
}

impl RedirectCaptureServer {
    /// Bind `127.0.0.1:port`, and `[::1]` on the same port when available.
    ///
    /// Port 0 picks a free ephemeral port. The redirect URI names
    /// `localhost`, which browsers may resolve to either address.
    pub async fn bind(port: u16, path: impl Into<String>) -> Result<Self, CaptureError> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| CaptureError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let port = listener
            .local_addr()
            .map_err(|source| CaptureError::Bind { addr, source })?
            .port();

        let listener_v6 = match TcpListener::bind(("::1", port)).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::debug!("IPv6 loopback unavailable on port {}: {}", port, e);
                None
            }
        };

        tracing::info!("Listening for OAuth redirect on localhost:{}", port);

        Ok(Self {
            listener,
            listener_v6,
            path: path.into(),
        })
    }

    /// Address the IPv4 listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.local_addr().map(|addr| addr.port()).unwrap_or_default()
    }

    /// Wait for the redirect and return its authorization code.
    ///
    /// Requests for other paths (favicons, health checks) are answered with 404 and
    /// the wait continues. A connection that cannot be read, or stays silent
    /// for ten seconds, is dropped.
    pub async fn capture(self, expected_state: &str) -> Result<CapturedRedirect, CaptureError> {
        let path: Arc<str> = Arc::from(self.path.as_str());
        let expected_state: Arc<str> = Arc::from(expected_state);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.accept() => {
                    let (socket, peer) = accepted?;
                    connections.spawn(serve(
                        socket,
                        peer,
                        Arc::clone(&path),
                        Arc::clone(&expected_state),
                    ));
                }
                Some(served) = connections.join_next() => match served {
                    Ok(Some(result)) => return result,
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Redirect connection task failed: {}", e),
                },
            }
        }
    }

    async fn accept(&self) -> Result<(TcpStream, SocketAddr), CaptureError> {
        let accepted = match &self.listener_v6 {
            Some(v6) => tokio::select! {
                accepted = self.listener.accept() => accepted,
                accepted = v6.accept() => accepted,
            },
            None => self.listener.accept().await,
        };
        accepted.map_err(CaptureError::Accept)
    }
}

/// Read one request and answer it.
///
/// Returns `None` when the wait for the redirect should go on.
async fn serve(
    mut socket: TcpStream,
    peer: SocketAddr,
    path: Arc<str>,
    expected_state: Arc<str>,
) -> Option<Result<CapturedRedirect, CaptureError>> {
    let mut buffer = vec![0u8; 8192];
    let n = match tokio::time::timeout(READ_TIMEOUT, socket.read(&mut buffer)).await {
        Ok(Ok(0)) => return None,
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            tracing::warn!(%peer, "Failed to read redirect request: {}", e);
            return None;
        }
        Err(_) => {
            tracing::debug!(%peer, "Dropping idle connection");
            return None;
        }
    };

    let request = String::from_utf8_lossy(&buffer[..n]);
    match inspect(&path, &request, &expected_state) {
        Outcome::Captured(redirect) => {
            respond(&mut socket, "200 OK", SUCCESS_HTML).await;
            tracing::info!("Received OAuth redirect");
            Some(Ok(redirect))
        }
        Outcome::Failed(err) => {
            respond(&mut socket, "400 Bad Request", FAILURE_HTML).await;
            Some(Err(err))
        }
        Outcome::NotFound => {
            respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
            None
        }
        Outcome::BadRequest => {
            respond(&mut socket, "400 Bad Request", BAD_REQUEST_HTML).await;
            None
        }
    }
}

fn inspect(path: &str, request: &str, expected_state: &str) -> Outcome {
    let Some(url) = request_path(request) else {
        return Outcome::BadRequest;
    };
    if url.path() != path {
        tracing::debug!(path = url.path(), "Ignoring request outside the redirect path");
        return Outcome::NotFound;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Outcome::Failed(CaptureError::Provider { error, description });
    }
    let Some(code) = code else {
        return Outcome::BadRequest;
    };
    if state.as_deref() != Some(expected_state) {
        return Outcome::Failed(CaptureError::StateMismatch);
    }

    Outcome::Captured(CapturedRedirect {
        code: Secret::new(code),
    })
}

/// Parse the target of a `GET` request line.
fn request_path(request: &str) -> Option<Url> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" || !target.starts_with('/') {
        return None;
    }
    Url::parse(&format!("http://localhost{}", target)).ok()
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
