//! The three user-authored fragments a preview is built from.

use serde::{Deserialize, Serialize};

/// Markup, style and script as authored in the editors.
///
/// Every field defaults to the empty string. Stored bundles use the
/// `html`/`css`/`js` keys, which are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBundle {
    #[serde(alias = "html")]
    pub markup: String,
    #[serde(alias = "css")]
    pub style: String,
    #[serde(alias = "js")]
    pub script: String,
}

impl SourceBundle {
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            script: script.into(),
        }
    }

    pub fn with_script(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty() && self.style.is_empty() && self.script.is_empty()
    }
}
