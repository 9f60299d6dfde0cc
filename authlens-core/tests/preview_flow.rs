//! Integration tests for diagram previews.
//!
//! These tests verify how diagram panels are keyed, replaced, wired and
//! refreshed:
//! - Last write wins per resource key
//! - Messages from replaced panels never reach the button handler
//! - Closing a panel removes its registry entry
//! - A failing resource leaves other panels untouched

use authlens_core::host::recording::RecordingHost;
use authlens_core::host::system::FsResourceReader;
use authlens_core::{
    BraceTemplate, LoginSettings, MemoryConfigStore, MemoryStore, PanelKind, PreviewCoordinator,
    PreviewError, PreviewSettings, ResourceKey, Surface,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIAGRAM_TEMPLATE: &str = "<style>body { margin: 0; }</style>\
    <div data-root=\"{assetRoot}\">{resourceContent}</div>\
    <span>{OIDC_TOKEN_REQUEST}</span>";

/// Helper to create a coordinator and a scratch directory holding the
/// diagram template.
fn setup() -> (PreviewCoordinator, Arc<RecordingHost>, TempDir) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("diagram.html"), DIAGRAM_TEMPLATE).unwrap();

    let host = RecordingHost::new();
    let context = host.context(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryConfigStore::new()),
        Arc::new(FsResourceReader),
    );
    let preview = PreviewCoordinator::new(
        context,
        PreviewSettings::default(),
        LoginSettings::default(),
        Arc::new(BraceTemplate::new()),
    );
    (preview, host, dir)
}

fn write_resource(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Poll `condition` until it holds or two seconds pass.
async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_resource_key_decodes_spaces() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "My%20Service.xml", "<flow/>");

    let key = preview.show_resource_preview(&path, dir.path()).await.unwrap();

    assert_eq!(key, ResourceKey::new("My Service"));
    assert_eq!(host.last_panel(PanelKind::Diagram).unwrap().title(), "My Service");
    assert!(preview.registry().get(&key).is_some());
}

#[tokio::test]
async fn test_rendered_html_keeps_unrelated_braces() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "<flow/>");

    preview.show_resource_preview(&path, dir.path()).await.unwrap();

    let html = host.last_panel(PanelKind::Diagram).unwrap().html();
    assert!(html.starts_with("<style>body { margin: 0; }</style>"));
    assert!(html.contains("&lt;flow/&gt;"));
    assert!(html.contains("OIDC Token Request"));
    assert!(html.contains(&format!("data-root=\"{}\"", dir.path().display())));
}

#[tokio::test]
async fn test_resource_markup_is_shown_as_text() {
    let (preview, host, dir) = setup();
    let path = write_resource(
        dir.path(),
        "assertion.xml",
        "<saml:Assertion ID=\"a\"><script>alert(1)</script></saml:Assertion>",
    );

    preview.show_resource_preview(&path, dir.path()).await.unwrap();

    let html = host.last_panel(PanelKind::Diagram).unwrap().html();
    assert!(!html.contains("<script>"));
    assert!(!html.contains("<saml:Assertion"));
    assert!(html.contains(
        "&lt;saml:Assertion ID=&quot;a&quot;&gt;&lt;script&gt;alert(1)&lt;/script&gt;&lt;/saml:Assertion&gt;"
    ));
}

#[tokio::test]
async fn test_regenerating_same_resource_replaces_entry() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "first");

    let key = preview.show_resource_preview(&path, dir.path()).await.unwrap();
    std::fs::write(&path, "second").unwrap();
    preview.show_resource_preview(&path, dir.path()).await.unwrap();

    let panels = host.panels();
    assert_eq!(panels.len(), 2);
    assert_eq!(preview.registry().len(), 1);

    let current = preview.registry().get(&key).unwrap();
    assert_eq!(current.id(), panels[1].id());
    assert!(current.html().contains("second"));
}

#[tokio::test]
async fn test_messages_are_forwarded_with_resource_path() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "<flow/>");

    preview.show_resource_preview(&path, dir.path()).await.unwrap();
    let panel = host.last_panel(PanelKind::Diagram).unwrap();

    assert!(panel.send(json!({"command": "step", "index": 1})));
    assert!(panel.send(json!({"command": "step", "index": 2})));
    eventually(|| host.clicks().len() == 2).await;

    let clicks = host.clicks();
    assert_eq!(clicks[0].0["index"], 1);
    assert_eq!(clicks[1].0["index"], 2);
    assert_eq!(clicks[0].1, path);
}

#[tokio::test]
async fn test_stale_panel_messages_are_dropped() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "<flow/>");

    preview.show_resource_preview(&path, dir.path()).await.unwrap();
    let stale = host.last_panel(PanelKind::Diagram).unwrap();
    preview.show_resource_preview(&path, dir.path()).await.unwrap();
    let current = host.last_panel(PanelKind::Diagram).unwrap();

    stale.send(json!({"command": "stale"}));
    current.send(json!({"command": "current"}));
    eventually(|| !host.clicks().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let clicks = host.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].0["command"], "current");
}

#[tokio::test]
async fn test_closing_panel_removes_entry() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "<flow/>");

    let key = preview.show_resource_preview(&path, dir.path()).await.unwrap();
    host.last_panel(PanelKind::Diagram).unwrap().close();

    eventually(|| preview.registry().get(&key).is_none()).await;
}

#[tokio::test]
async fn test_closing_replaced_panel_keeps_current_entry() {
    let (preview, host, dir) = setup();
    let path = write_resource(dir.path(), "flow.xml", "<flow/>");

    let key = preview.show_resource_preview(&path, dir.path()).await.unwrap();
    let stale = host.last_panel(PanelKind::Diagram).unwrap();
    preview.show_resource_preview(&path, dir.path()).await.unwrap();
    let current_id = host.last_panel(PanelKind::Diagram).unwrap().id();

    stale.close();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(preview.registry().get(&key).unwrap().id(), current_id);
}

#[tokio::test]
async fn test_missing_resource_does_not_affect_other_panels() {
    let (preview, host, dir) = setup();
    let good = write_resource(dir.path(), "good.xml", "<good/>");

    let key = preview.show_resource_preview(&good, dir.path()).await.unwrap();
    let before = preview.registry().get(&key).unwrap().html().to_string();

    let result = preview
        .show_resource_preview(&dir.path().join("missing.xml"), dir.path())
        .await;

    assert!(matches!(result, Err(PreviewError::ResourceRead { .. })));
    assert_eq!(host.errors().len(), 1);
    assert!(host.errors()[0].contains("missing.xml"));
    assert_eq!(preview.registry().len(), 1);
    assert_eq!(preview.registry().get(&key).unwrap().html(), before);
}

#[tokio::test]
async fn test_refresh_all_rerenders_in_place() {
    let (preview, host, dir) = setup();
    let a = write_resource(dir.path(), "a.xml", "a1");
    let b = write_resource(dir.path(), "b.xml", "b1");

    let key_a = preview.show_resource_preview(&a, dir.path()).await.unwrap();
    let key_b = preview.show_resource_preview(&b, dir.path()).await.unwrap();
    std::fs::write(&a, "a2").unwrap();
    std::fs::remove_file(&b).unwrap();

    let results = preview.refresh_all().await;

    assert_eq!(results.len(), 2);
    for (key, result) in &results {
        if *key == key_a {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(PreviewError::ResourceRead { .. })));
        }
    }

    assert_eq!(host.panels().len(), 2);
    assert!(preview.registry().get(&key_a).unwrap().html().contains("a2"));
    assert!(preview.registry().get(&key_b).unwrap().html().contains("b1"));

    let panel_a = host
        .panels()
        .into_iter()
        .find(|p| p.title() == "a")
        .unwrap();
    assert!(panel_a.html().contains("a2"));
    assert_eq!(host.errors().len(), 1);
}
