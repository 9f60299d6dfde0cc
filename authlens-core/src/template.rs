//! HTML template rendering.
//!
//! Templates use `{name}` placeholders, where `name` consists of ASCII
//! letters, digits and underscores. `{{name}}` renders a literal `{name}`.
//! Braces that do not form a placeholder, such as CSS rule bodies or
//! JavaScript blocks, pass through untouched.
//!
//! Placeholders with no value are governed by [`UnresolvedPolicy`]. The
//! default keeps them verbatim in the output.
//!
//! Values are inserted as given. Callers filling element text or attribute
//! values pass them through [`escape_html`] first.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Placeholder name to value mapping.
pub type Placeholders = BTreeMap<String, String>;

/// Error type for template rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A placeholder had no value and the renderer is strict.
    #[error("unresolved template placeholder: {name}")]
    Unresolved { name: String },

    /// The template file could not be read.
    #[error("template {path} could not be read: {source}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to do with a placeholder that has no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Leave `{name}` in the output.
    #[default]
    LeaveVerbatim,

    /// Fail with [`TemplateError::Unresolved`].
    Reject,
}

/// Renders a template with named placeholder values.
///
/// Implementations must be pure: the same inputs always render the same output.
pub trait TemplateRenderer: Send + Sync {
    /// Substitute `placeholders` into `template`.
    fn render(&self, template: &str, placeholders: &Placeholders) -> Result<String, TemplateError>;
}

/// Brace-delimited placeholder renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceTemplate {
    policy: UnresolvedPolicy,
}

impl BraceTemplate {
    /// Create a renderer with the default (verbatim) policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer with an explicit policy.
    pub fn with_policy(policy: UnresolvedPolicy) -> Self {
        Self { policy }
    }
}

impl TemplateRenderer for BraceTemplate {
    fn render(&self, template: &str, placeholders: &Placeholders) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];

            if let Some(name) = escaped_name(tail) {
                out.push('{');
                out.push_str(name);
                out.push('}');
                rest = &tail[name.len() + 4..];
                continue;
            }

            let Some(name) = placeholder_name(tail) else {
                out.push('{');
                rest = &tail[1..];
                continue;
            };

            match placeholders.get(name) {
                Some(value) => out.push_str(value),
                None => match self.policy {
                    UnresolvedPolicy::LeaveVerbatim => out.push_str(&tail[..name.len() + 2]),
                    UnresolvedPolicy::Reject => {
                        return Err(TemplateError::Unresolved {
                            name: name.to_string(),
                        });
                    }
                },
            }
            rest = &tail[name.len() + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Escape `value` for use as HTML text or a quoted attribute value.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Name inside `{name}` at the start of `s`.
fn placeholder_name(s: &str) -> Option<&str> {
    let body = s.strip_prefix('{')?;
    let end = body.find('}')?;
    let name = &body[..end];
    is_identifier(name).then_some(name)
}

/// Name inside `{{name}}` at the start of `s`.
fn escaped_name(s: &str) -> Option<&str> {
    let body = s.strip_prefix("{{")?;
    let end = body.find("}}")?;
    let name = &body[..end];
    is_identifier(name).then_some(name)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> Placeholders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_placeholders() {
        let html = BraceTemplate::new()
            .render(
                "<p>{clientId} at {baseUrl}</p>",
                &values(&[("clientId", "abc"), ("baseUrl", "https://idp.example")]),
            )
            .unwrap();
        assert_eq!(html, "<p>abc at https://idp.example</p>");
    }

    #[test]
    fn test_unresolved_left_verbatim_by_default() {
        let html = BraceTemplate::new()
            .render("<p>{missing}</p>", &Placeholders::new())
            .unwrap();
        assert_eq!(html, "<p>{missing}</p>");
    }

    #[test]
    fn test_unresolved_rejected_when_strict() {
        let result = BraceTemplate::with_policy(UnresolvedPolicy::Reject)
            .render("<p>{missing}</p>", &Placeholders::new());
        assert!(matches!(result, Err(TemplateError::Unresolved { name }) if name == "missing"));
    }

    #[test]
    fn test_css_and_script_braces_pass_through() {
        let template = "<style>body { margin: 0 }</style><script>if (x) { y(); }</script>{a}";
        let html = BraceTemplate::with_policy(UnresolvedPolicy::Reject)
            .render(template, &values(&[("a", "1")]))
            .unwrap();
        assert_eq!(
            html,
            "<style>body { margin: 0 }</style><script>if (x) { y(); }</script>1"
        );
    }

    #[test]
    fn test_double_braces_escape_placeholder() {
        let html = BraceTemplate::new()
            .render("{{name}} = {name}", &values(&[("name", "v")]))
            .unwrap();
        assert_eq!(html, "{name} = v");
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let html = BraceTemplate::new()
            .render("{a}", &values(&[("a", "{b}"), ("b", "nope")]))
            .unwrap();
        assert_eq!(html, "{b}");
    }

    #[test]
    fn test_multibyte_text_around_placeholders() {
        let html = BraceTemplate::new()
            .render("héllo {n} — ✓ {", &values(&[("n", "wörld")]))
            .unwrap();
        assert_eq!(html, "héllo wörld — ✓ {");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain ✓"), "plain ✓");
    }
}
