//! Isolation host: owns the isolated context of the current run and replaces
//! it wholesale on every `present`.
//!
//! Each run gets its own OS thread, its own current-thread tokio runtime and
//! its own V8 isolate. Nothing is reused between runs. Replacing a run sets
//! its cancellation flag, terminates whatever JS it is executing and drops its
//! teardown channel so its event loop stops being polled. Whatever the old
//! isolate still manages to post carries the old generation and is refused by
//! the sink.

use crate::config::PreviewConfig;
use crate::document::ExecutableDocument;
use crate::error::PreviewError;
use crate::relay::{HostEvent, RunOutcome};
use crate::runtime::{create_runtime, run_document, RunContext};
use crate::sink::ConsoleSink;
use deno_core::v8::IsolateHandle;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use url::Url;
use uuid::Uuid;

/// Identifies one isolated run. Strictly increasing per host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RunGeneration(u64);

impl RunGeneration {
    /// Before the first run.
    pub const NONE: Self = Self(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The live run: enough to tear it down from the host thread.
struct RunHandle {
    generation: RunGeneration,
    locator: Url,
    cancelled: Arc<AtomicBool>,
    isolate: IsolateHandle,
    teardown: Option<oneshot::Sender<()>>,
    _thread: JoinHandle<()>,
}

impl RunHandle {
    fn tear_down(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.isolate.terminate_execution();
        // Dropping the sender wakes the run's event loop select
        drop(self.teardown.take());
        tracing::debug!(
            target: "preview::host",
            generation = %self.generation,
            locator = %self.locator,
            "run torn down"
        );
    }
}

/// Owns at most one isolated context at a time.
pub struct IsolationHost {
    config: PreviewConfig,
    events: mpsc::UnboundedSender<HostEvent>,
    sink: ConsoleSink,
    latest: RunGeneration,
    current: Option<RunHandle>,
}

impl IsolationHost {
    /// `events` is where every run posts; `sink` is switched to each new run.
    pub fn new(
        config: PreviewConfig,
        events: mpsc::UnboundedSender<HostEvent>,
        sink: ConsoleSink,
    ) -> Self {
        Self {
            config,
            events,
            sink,
            latest: RunGeneration::NONE,
            current: None,
        }
    }

    /// Generation of the most recent `present`, successful or not.
    pub fn latest_generation(&self) -> RunGeneration {
        self.latest
    }

    /// Replace the current isolated context with one running `doc`.
    ///
    /// Returns once the new isolate exists; does not wait for its scripts.
    /// Fails only if isolated execution cannot be set up.
    pub fn present(&mut self, doc: ExecutableDocument) -> Result<RunGeneration, PreviewError> {
        self.latest = self.latest.next();
        let generation = self.latest;

        if let Some(prior) = self.current.take() {
            prior.tear_down();
        }
        self.sink.begin_run(generation);

        let locator = Url::parse(&format!(
            "preview://sandbox/{}/{}/document.html",
            generation.get(),
            Uuid::new_v4()
        ))
        .map_err(PreviewError::environment)?;

        let run = self.spawn_run(generation, locator, doc)?;
        tracing::debug!(
            target: "preview::host",
            generation = %generation,
            locator = %run.locator,
            "run presented"
        );
        self.current = Some(run);
        Ok(generation)
    }

    fn spawn_run(
        &self,
        generation: RunGeneration,
        locator: Url,
        document: ExecutableDocument,
    ) -> Result<RunHandle, PreviewError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (teardown_tx, teardown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) =
            std::sync::mpsc::sync_channel::<Result<IsolateHandle, String>>(1);

        let ctx = RunContext {
            generation,
            locator: locator.clone(),
            document,
            events: self.events.clone(),
            cancelled: cancelled.clone(),
            teardown: teardown_rx,
        };

        let mut builder =
            std::thread::Builder::new().name(format!("preview-run-{}", generation.get()));
        if let Some(size) = self.config.thread_stack_size {
            builder = builder.stack_size(size);
        }

        let thread = builder
            .spawn(move || run_thread(ctx, ready_tx))
            .map_err(|e| PreviewError::environment(format!("failed to spawn run thread: {e}")))?;

        let isolate = match ready_rx.recv() {
            Ok(Ok(isolate)) => isolate,
            Ok(Err(reason)) => return Err(PreviewError::Environment(reason)),
            // The thread died before reporting, e.g. V8 failed to initialise
            Err(_) => {
                return Err(PreviewError::environment(
                    "isolated context exited before it was ready",
                ))
            }
        };

        Ok(RunHandle {
            generation,
            locator,
            cancelled,
            isolate,
            teardown: Some(teardown_tx),
            _thread: thread,
        })
    }

    /// Tear down the live run, if any. The sink keeps its entries.
    pub fn shutdown(&mut self) {
        if let Some(run) = self.current.take() {
            run.tear_down();
        }
    }
}

impl Drop for IsolationHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Body of a run thread.
fn run_thread(
    mut ctx: RunContext,
    ready: std::sync::mpsc::SyncSender<Result<IsolateHandle, String>>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to build run runtime: {e}")));
            return;
        }
    };

    rt.block_on(async move {
        let mut runtime = create_runtime(ctx.generation, ctx.events.clone());
        let isolate = runtime.v8_isolate().thread_safe_handle();
        if ready.send(Ok(isolate)).is_err() {
            return;
        }

        let outcome = if ctx.cancelled.load(Ordering::SeqCst) {
            RunOutcome::TornDown
        } else {
            run_document(&mut runtime, &mut ctx).await
        };

        tracing::debug!(
            target: "preview::host",
            generation = %ctx.generation,
            ?outcome,
            "run settled"
        );
        let _ = ctx.events.send(HostEvent::Settled {
            generation: ctx.generation,
            outcome,
        });
    });
}
