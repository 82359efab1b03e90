//! Document synthesis: three fragments in, one executable document out.
//!
//! The document carries two scripts after the user's markup:
//!
//! 1. The relay preamble. It receives the forwarder (`parent`), the console and
//!    the window as arguments, wraps `console.log/error/warn` so every call still reaches
//!    the original console and is also posted to the host, and forwards the
//!    window `error` event.
//! 2. The user script inside a `try`/`catch` failure boundary.
//!
//! Keeping them apart means a syntax error in the user script cannot stop the
//! preamble from installing; it reaches the host through the `error` event.

use crate::bundle::SourceBundle;
use crate::config::PreviewConfig;
use crate::document::ExecutableDocument;

/// Synthesize with the default document settings.
pub fn synthesize(bundle: &SourceBundle) -> ExecutableDocument {
    synthesize_with(bundle, &PreviewConfig::default())
}

/// Synthesize a preview document. Total: every bundle yields a document.
pub fn synthesize_with(bundle: &SourceBundle, config: &PreviewConfig) -> ExecutableDocument {
    let lang = html_escape::encode_double_quoted_attribute(&config.lang);
    let title = html_escape::encode_text(&config.title);
    // serde_json string encoding is a valid JS string literal
    let error_prefix = serde_json::Value::from(config.error_prefix.as_str()).to_string();

    let mut out = String::with_capacity(
        RELAY_PREAMBLE.len()
            + bundle.markup.len()
            + bundle.style.len()
            + bundle.script.len()
            + 512,
    );

    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!("<html lang=\"{lang}\">\n"));
    out.push_str("<head>\n");
    out.push_str("<meta charset=\"UTF-8\">\n");
    out.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    out.push_str(&format!("<title>{title}</title>\n"));
    out.push_str("<style>");
    out.push_str(&bundle.style);
    out.push_str("</style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&bundle.markup);
    out.push('\n');
    out.push_str("<script>");
    out.push_str(RELAY_PREAMBLE);
    out.push_str("</script>\n");
    out.push_str("<script>\ntry {\n");
    out.push_str(&bundle.script);
    out.push_str("\n} catch (error) {\n  console.error(");
    out.push_str(&error_prefix);
    out.push_str(
        ", error && error.message !== undefined ? error.message : String(error));\n}\n",
    );
    out.push_str("</script>\n");
    out.push_str("</body>\n</html>\n");

    ExecutableDocument::new(out)
}

const RELAY_PREAMBLE: &str = r#"
(function (relay, console, window) {
  "use strict";
  var methods = ["log", "error", "warn"];
  var original = {};

  function toRelayValue(value) {
    if (value === null) return null;
    switch (typeof value) {
      case "string":
      case "number":
      case "boolean":
        return value;
      case "undefined":
        return "undefined";
    }
    if (value instanceof Error) return String(value);
    try {
      var json = JSON.stringify(value);
      if (json !== undefined) return json;
    } catch (_) {}
    try {
      return String(value);
    } catch (_) {
      return "[unprintable]";
    }
  }

  function forward(method, args) {
    try {
      relay.postMessage({
        type: "console",
        method: method,
        args: Array.prototype.map.call(args, toRelayValue),
      }, "*");
    } catch (_) {
      // forwarding must never throw into user code
    }
  }

  methods.forEach(function (method) {
    original[method] = console[method];
    console[method] = function () {
      original[method].apply(console, arguments);
      forward(method, arguments);
    };
  });

  window.addEventListener("error", function (event) {
    forward("error", [event.message]);
  });
})(globalThis.parent, globalThis.console, globalThis);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeds_fragments_verbatim() {
        let bundle = SourceBundle::new(
            "<p>hi</p>",
            "p{color:red}",
            "console.log('a'); console.error('b');",
        );
        let doc = synthesize(&bundle);
        let text = doc.as_str();

        assert!(text.contains("<style>p{color:red}</style>"));
        assert!(text.contains("<body>\n<p>hi</p>\n"));
        assert!(text.contains("console.log('a'); console.error('b');"));
    }

    #[test]
    fn test_empty_bundle_still_has_preamble() {
        let doc = synthesize(&SourceBundle::default());
        assert!(!doc.is_empty());
        assert!(doc.as_str().starts_with("<!DOCTYPE html>"));
        assert!(doc.as_str().contains("relay.postMessage"));
        assert_eq!(doc.scripts().unwrap().len(), 2);
    }

    #[test]
    fn test_user_script_runs_after_preamble_inside_boundary() {
        let doc = synthesize(&SourceBundle::with_script("go();"));
        let scripts = doc.scripts().unwrap();

        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].source.contains("addEventListener(\"error\""));
        assert!(scripts[1].source.starts_with("\ntry {\ngo();\n}"));
        assert!(scripts[1].source.contains("console.error(\"JS Error:\""));
    }

    #[test]
    fn test_markup_scripts_run_before_preamble() {
        let bundle = SourceBundle::new("<script>early()</script>", "", "late()");
        let doc = synthesize(&bundle);
        let scripts = doc.scripts().unwrap();

        assert_eq!(scripts.len(), 3);
        assert_eq!(scripts[0].source, "early()");
        assert!(scripts[2].source.contains("late()"));
    }

    #[test]
    fn test_config_is_escaped() {
        let config = PreviewConfig {
            title: "<Demo> & co".into(),
            lang: "en\" onload=\"x".into(),
            error_prefix: "Oops \"quoted\"".into(),
            ..Default::default()
        };
        let doc = synthesize_with(&SourceBundle::default(), &config);
        let text = doc.as_str();

        assert!(text.contains("<title>&lt;Demo&gt; &amp; co</title>"));
        assert!(!text.contains("onload=\"x"));
        assert!(text.contains(r#"console.error("Oops \"quoted\"""#));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let bundle = SourceBundle::new("<i>a</i>", "i{}", "1+1");
        assert_eq!(synthesize(&bundle), synthesize(&bundle));
    }
}
