//! Engine configuration, read from an optional TOML file.
//!
//! ```toml
//! title = "Playground"
//! lang = "en"
//! error_prefix = "JS Error:"
//! thread_stack_size = 8388608
//! notice_capacity = 16
//! ```

use crate::error::PreviewError;
use serde::Deserialize;
use std::path::Path;

/// Configuration for the preview engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// `<title>` of the synthesized document
    pub title: String,
    /// `lang` attribute of the synthesized document
    pub lang: String,
    /// First argument of the diagnostic raised when the user script throws
    pub error_prefix: String,
    /// Stack size for run threads in bytes (None = platform default)
    pub thread_stack_size: Option<usize>,
    /// Maximum queued notices before the oldest is dropped
    pub notice_capacity: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            title: String::from("Preview"),
            lang: String::from("en"),
            error_prefix: String::from("JS Error:"),
            thread_stack_size: None,
            notice_capacity: 16,
        }
    }
}

impl PreviewConfig {
    pub fn from_path(path: &Path) -> Result<Self, PreviewError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PreviewError::ConfigRead(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| PreviewError::ConfigParse(path.to_path_buf(), e))
    }
}
