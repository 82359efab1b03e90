//! The assembled engine: scheduler, isolation host, listener and sink.

use crate::bundle::SourceBundle;
use crate::config::PreviewConfig;
use crate::document::ExecutableDocument;
use crate::error::PreviewError;
use crate::host::{IsolationHost, RunGeneration};
use crate::listener::HostListener;
use crate::notice::{Notice, NoticeQueue};
use crate::scheduler::UpdateScheduler;
use crate::sink::{ConsoleSink, DiagnosticEntry};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Live-preview engine.
///
/// Must be started inside a tokio runtime: the host listener runs as a task
/// on it.
pub struct PreviewEngine {
    scheduler: UpdateScheduler,
    sink: ConsoleSink,
    settled: watch::Receiver<RunGeneration>,
    notices: NoticeQueue,
    listener: JoinHandle<()>,
}

impl PreviewEngine {
    pub fn start(config: PreviewConfig) -> Result<Self, PreviewError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| PreviewError::environment(format!("no tokio runtime: {e}")))?;

        let sink = ConsoleSink::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let listener = HostListener::new(sink.clone());
        let settled = listener.settled();
        let listener = handle.spawn(listener.run(events_rx));

        let notices = NoticeQueue::new(config.notice_capacity);
        let host = IsolationHost::new(config.clone(), events_tx, sink.clone());

        Ok(Self {
            scheduler: UpdateScheduler::new(config, host),
            sink,
            settled,
            notices,
            listener,
        })
    }

    /// Edit event: re-synthesize and re-present.
    pub fn schedule(&mut self, bundle: &SourceBundle) -> Result<RunGeneration, PreviewError> {
        self.scheduler.schedule(bundle)
    }

    /// Explicit run request.
    pub fn run(&mut self, bundle: &SourceBundle) -> Result<RunGeneration, PreviewError> {
        let generation = self.schedule(bundle)?;
        self.notices.push("Code executed!");
        Ok(generation)
    }

    /// Explicit console clear.
    pub fn clear_console(&mut self) {
        self.sink.clear();
        self.notices.push("Console cleared");
    }

    /// Clear the console and present an empty bundle.
    pub fn reset(&mut self) -> Result<RunGeneration, PreviewError> {
        self.sink.clear();
        let generation = self.schedule(&SourceBundle::default())?;
        self.notices.push("All code cleared");
        Ok(generation)
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.sink.entries()
    }

    pub fn sink(&self) -> &ConsoleSink {
        &self.sink
    }

    pub fn current_generation(&self) -> RunGeneration {
        self.scheduler.host().latest_generation()
    }

    pub fn last_document(&self) -> Option<&ExecutableDocument> {
        self.scheduler.last_document()
    }

    /// Resolves once `generation` (or a later run) has settled and all of its
    /// relayed messages have been processed. Never resolves for a run that
    /// does not terminate; callers bound it with a timeout.
    pub async fn wait_settled(&self, generation: RunGeneration) {
        let mut settled = self.settled.clone();
        // Err only if the listener is gone, and then nothing more will arrive
        let _ = settled.wait_for(|latest| *latest >= generation).await;
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }
}

impl Drop for PreviewEngine {
    fn drop(&mut self) {
        self.scheduler.host_mut().shutdown();
        self.listener.abort();
    }
}
