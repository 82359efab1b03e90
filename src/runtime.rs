//! Preview runtime - executes one synthesized document in a sandboxed V8
//! isolate.
//!
//! Provides only what a preview needs:
//! - console.log/warn/error (overridden by the document's preamble)
//! - setTimeout/setInterval, queueMicrotask
//! - URL, URLSearchParams, TextEncoder, TextDecoder, atob, btoa, crypto
//! - Event, EventTarget, ErrorEvent and a window-level `error` event
//! - `parent.postMessage` as the single channel back to the host
//! - No fs, net, env, module loading, or other system access

use crate::document::ExecutableDocument;
use crate::host::RunGeneration;
use crate::ops::{preview_runtime, PreviewPermissions, RelayPort};
use crate::relay::{HostEvent, RunOutcome};
use anyhow::Error;
use deno_core::error::JsError;
use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use url::Url;

/// Pre-compiled V8 snapshot containing the extension JS (see build.rs).
static PREVIEW_SNAPSHOT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/PREVIEW_SNAPSHOT.bin"));

/// Everything a run thread needs. Moved onto the thread that owns the isolate.
pub(crate) struct RunContext {
    pub generation: RunGeneration,
    pub locator: Url,
    pub document: ExecutableDocument,
    pub events: mpsc::UnboundedSender<HostEvent>,
    pub cancelled: Arc<AtomicBool>,
    pub teardown: oneshot::Receiver<()>,
}

/// Create a sandboxed JS runtime whose relay posts into `events`, stamped
/// with `generation`.
pub(crate) fn create_runtime(
    generation: RunGeneration,
    events: mpsc::UnboundedSender<HostEvent>,
) -> JsRuntime {
    // Extensions are registered in the same order as in the snapshot
    let extensions = vec![
        deno_webidl::deno_webidl::init_ops(),
        deno_console::deno_console::init_ops(),
        deno_url::deno_url::init_ops(),
        deno_web::deno_web::init_ops::<PreviewPermissions>(
            Arc::new(deno_web::BlobStore::default()),
            None,
        ),
        deno_crypto::deno_crypto::init_ops(None),
        preview_runtime::init_ops(),
    ];

    let mut runtime = JsRuntime::new(RuntimeOptions {
        startup_snapshot: Some(PREVIEW_SNAPSHOT),
        extensions,
        ..Default::default()
    });

    {
        let op_state = runtime.op_state();
        let mut state = op_state.borrow_mut();
        state.put(PreviewPermissions);
        state.put(RelayPort::new(move |payload| {
            // The receiver is gone only when the host itself is gone
            let _ = events.send(HostEvent::Posted {
                generation,
                payload,
            });
        }));
    }

    runtime
}

/// Load the document into `runtime` and drive it until its event loop drains
/// or the run is torn down.
pub(crate) async fn run_document(runtime: &mut JsRuntime, ctx: &mut RunContext) -> RunOutcome {
    let scripts = match ctx.document.scripts() {
        Ok(scripts) => scripts,
        Err(error) => {
            tracing::warn!(target: "preview::runtime", %error, "could not read document scripts");
            Vec::new()
        }
    };

    for script in scripts {
        if ctx.cancelled.load(Ordering::SeqCst) {
            return RunOutcome::TornDown;
        }

        let source = with_source_url(&script.source, &ctx.locator, script.index);
        if let Err(error) = runtime.execute_script("<preview>", source) {
            if ctx.cancelled.load(Ordering::SeqCst) {
                return RunOutcome::TornDown;
            }
            report_uncaught(runtime, &error);
        }
    }

    loop {
        if ctx.cancelled.load(Ordering::SeqCst) {
            return RunOutcome::TornDown;
        }

        let step = tokio::select! {
            result = runtime.run_event_loop(PollEventLoopOptions::default()) => Some(result),
            _ = &mut ctx.teardown => None,
        };

        match step {
            None => return RunOutcome::TornDown,
            Some(Ok(())) => return RunOutcome::Completed,
            Some(Err(error)) => {
                if ctx.cancelled.load(Ordering::SeqCst) {
                    return RunOutcome::TornDown;
                }
                // Timer callbacks and unhandled rejections land here; the rest
                // of the run keeps going, as it would in a browser tab.
                report_uncaught(runtime, &error);
            }
        }
    }
}

/// Fire the sandbox's window `error` event for an uncaught error.
fn report_uncaught(runtime: &mut JsRuntime, error: &Error) {
    let message = match error.downcast_ref::<JsError>() {
        Some(js_error) => js_error.exception_message.clone(),
        None => error.to_string(),
    };
    tracing::debug!(target: "preview::runtime", %message, "uncaught error in preview");

    let message = serde_json::Value::from(message).to_string();
    let dispatch = format!("globalThis[Symbol.for(\"preview.reportUncaught\")]({message});");
    if let Err(e) = runtime.execute_script("<preview:uncaught>", dispatch) {
        // A throwing error listener ends up here; nothing else to report to
        tracing::debug!(target: "preview::runtime", error = %e, "error event dispatch failed");
    }
}

/// Attach the per-load locator so stack traces name the run and script.
fn with_source_url(source: &str, locator: &Url, index: usize) -> String {
    let mut script = String::with_capacity(source.len() + locator.as_str().len() + 32);
    script.push_str(source);
    if !source.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("//# sourceURL=");
    script.push_str(locator.as_str());
    script.push_str("#script-");
    script.push_str(&index.to_string());
    script.push('\n');
    script
}
