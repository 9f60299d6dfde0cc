//! Host capabilities backed by the real system.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use url::Url;

use super::{ButtonClickHandler, Notifier, ResourceReader};
#[cfg(feature = "browser")]
use super::{HostError, UrlOpener};

/// Opens URLs in the default system browser.
#[cfg(feature = "browser")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserOpener;

#[cfg(feature = "browser")]
impl UrlOpener for BrowserOpener {
    fn open(&self, url: &Url) -> Result<(), HostError> {
        tracing::info!("Opening browser at {}", redact_query(url));
        webbrowser::open(url.as_str()).map_err(|e| HostError::Browser {
            url: redact_query(url),
            message: e.to_string(),
        })
    }
}

/// Render a URL without its query string, which may carry codes or state.
pub fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Reads files with `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResourceReader;

#[async_trait]
impl ResourceReader for FsResourceReader {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// Sends notifications to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Logs diagram actions with the resource they came from.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingButtonHandler;

impl ButtonClickHandler for TracingButtonHandler {
    fn handle(&self, message: Value, resource_path: &Path) {
        tracing::info!(resource = %resource_path.display(), %message, "Diagram action");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_redact_query_drops_parameters() {
        let url = Url::parse("https://idp.example/authorize?client_id=abc&state=xyz").unwrap();
        assert_eq!(redact_query(&url), "https://idp.example/authorize");
    }

    #[tokio::test]
    async fn test_fs_reader_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.xml");
        std::fs::write(&path, "<flow/>").unwrap();

        let text = FsResourceReader.read_to_string(&path).await.unwrap();
        assert_eq!(text, "<flow/>");
    }

    #[tokio::test]
    async fn test_fs_reader_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FsResourceReader
            .read_to_string(&dir.path().join("missing.xml"))
            .await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }
}
