//! The synthesized, self-contained document handed to an isolated run.

use anyhow::{anyhow, Result};
use kuchiki::parse_html;
use kuchiki::traits::*;
use std::fmt;

/// One fully self-contained preview document.
///
/// Created by [`crate::synthesize`], never mutated afterwards, and superseded
/// wholesale by the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableDocument {
    source: String,
}

/// An inline classic script found in a document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineScript {
    pub index: usize,
    pub source: String,
}

impl ExecutableDocument {
    pub(crate) fn new(source: String) -> Self {
        Self { source }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Inline scripts a browser would run as classic scripts.
    ///
    /// Elements with a `src` attribute, a non-JavaScript `type` or an empty
    /// body are skipped. Comments, attribute values and `<template>` contents
    /// never yield scripts.
    pub fn scripts(&self) -> Result<Vec<InlineScript>> {
        let parsed = parse_html().one(self.source.as_str());
        let selector = parsed
            .select("script")
            .map_err(|_| anyhow!("failed to compile selector"))?;

        let mut scripts = Vec::new();
        for script in selector {
            let attributes = script.attributes.borrow();
            let external = attributes
                .get("src")
                .is_some_and(|src| !src.trim().is_empty());
            if external || !is_classic(attributes.get("type")) {
                continue;
            }
            drop(attributes);

            let source = script.text_contents();
            if source.trim().is_empty() {
                continue;
            }
            scripts.push(InlineScript {
                index: scripts.len(),
                source,
            });
        }

        Ok(scripts)
    }
}

impl fmt::Display for ExecutableDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl AsRef<str> for ExecutableDocument {
    fn as_ref(&self) -> &str {
        &self.source
    }
}

fn is_classic(script_type: Option<&str>) -> bool {
    match script_type.map(|value| value.trim().to_ascii_lowercase()) {
        None => true,
        Some(kind) => matches!(
            kind.as_str(),
            "" | "text/javascript"
                | "application/javascript"
                | "text/ecmascript"
                | "application/ecmascript"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str) -> ExecutableDocument {
        ExecutableDocument::new(source.to_string())
    }

    fn sources(d: &ExecutableDocument) -> Vec<String> {
        d.scripts()
            .unwrap()
            .into_iter()
            .map(|script| script.source)
            .collect()
    }

    #[test]
    fn test_scripts_in_document_order() {
        let d = doc("<p>x</p><script>one()</script><div></div><SCRIPT>two()</SCRIPT>");
        let scripts = d.scripts().unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].source, "one()");
        assert_eq!(scripts[1].source, "two()");
        assert_eq!(scripts[1].index, 1);
    }

    #[test]
    fn test_skips_external_and_non_js() {
        let d = doc(concat!(
            r#"<script src="https://cdn.example/lib.js"></script>"#,
            r#"<script type="text/template"><b>{{x}}</b></script>"#,
            r#"<script type="module">import x from "y";</script>"#,
            r#"<script type='text/javascript'>kept()</script>"#,
        ));
        let scripts = d.scripts().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].source, "kept()");
        assert_eq!(scripts[0].index, 0);
    }

    #[test]
    fn test_ignores_lookalike_elements() {
        let d = doc(concat!(
            "<scripts>nope</scripts>",
            "<script-panel>no</script-panel>",
            "<script defer>yes()</script>",
        ));
        let scripts = d.scripts().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].source, "yes()");
    }

    #[test]
    fn test_unterminated_script_runs_to_end() {
        let d = doc("<script>tail()");
        assert_eq!(sources(&d), vec!["tail()"]);
    }

    #[test]
    fn test_no_scripts() {
        assert!(sources(&doc("<p>static</p>")).is_empty());
        assert!(sources(&doc("")).is_empty());
        assert!(sources(&doc("<script>  </script>")).is_empty());
    }

    #[test]
    fn test_commented_script_tag_is_not_a_script() {
        let d = doc(concat!(
            "<!-- add <script> later -->\n",
            "<script>first()</script>\n",
            "<script>second()</script>",
        ));
        assert_eq!(sources(&d), vec!["first()", "second()"]);
    }

    #[test]
    fn test_script_text_in_attribute_is_not_a_script() {
        let d = doc("<p title=\"<script>\">x</p>\n<script>first()</script>");
        assert_eq!(sources(&d), vec!["first()"]);
    }

    #[test]
    fn test_quoted_angle_bracket_in_attribute() {
        let d = doc(r#"<script data-x="a>b">ok()</script>"#);
        assert_eq!(sources(&d), vec!["ok()"]);
    }

    #[test]
    fn test_template_contents_do_not_run() {
        let d = doc("<template><script>inert()</script></template><script>live()</script>");
        assert_eq!(sources(&d), vec!["live()"]);
    }
}
