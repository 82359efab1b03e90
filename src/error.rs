//! Errors surfaced to callers of the preview engine.
//!
//! Problems inside the sandbox are never errors here: a throwing user script
//! becomes an `error` diagnostic, and a malformed relay message is dropped
//! (see [`crate::relay::RelayRejection`]).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    /// Isolated execution is not available in this process.
    #[error("isolated execution unavailable: {0}")]
    Environment(String),

    #[error("IO error when reading `{0}`")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error in `{0}`")]
    ConfigParse(PathBuf, #[source] toml::de::Error),
}

impl PreviewError {
    pub(crate) fn environment(context: impl std::fmt::Display) -> Self {
        Self::Environment(context.to_string())
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, Self::Environment(_))
    }
}
