//! Update scheduler: every edit becomes one full synthesize + present cycle.
//!
//! No debounce and no explicit cancellation. A newer call simply presents a
//! newer generation; the older run loses its channel to the sink.

use crate::bundle::SourceBundle;
use crate::config::PreviewConfig;
use crate::document::ExecutableDocument;
use crate::error::PreviewError;
use crate::host::{IsolationHost, RunGeneration};
use crate::synthesize::synthesize_with;

pub struct UpdateScheduler {
    config: PreviewConfig,
    host: IsolationHost,
    last_document: Option<ExecutableDocument>,
}

impl UpdateScheduler {
    pub fn new(config: PreviewConfig, host: IsolationHost) -> Self {
        Self {
            config,
            host,
            last_document: None,
        }
    }

    /// Synthesize `bundle` and present it, superseding any previous run.
    pub fn schedule(&mut self, bundle: &SourceBundle) -> Result<RunGeneration, PreviewError> {
        let document = synthesize_with(bundle, &self.config);
        self.last_document = Some(document.clone());
        let generation = self.host.present(document)?;
        tracing::debug!(
            target: "preview::scheduler",
            generation = %generation,
            script_bytes = bundle.script.len(),
            "scheduled preview"
        );
        Ok(generation)
    }

    /// The document of the most recent `schedule` call.
    pub fn last_document(&self) -> Option<&ExecutableDocument> {
        self.last_document.as_ref()
    }

    pub fn host(&self) -> &IsolationHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut IsolationHost {
        &mut self.host
    }
}
