//! # Preview Sandbox
//!
//! A live-preview engine for untrusted markup, style and script, using
//! deno_core.
//!
//! ## Isolation Guarantees
//!
//! - **Fresh isolate per run**: every edit boots a new V8 isolate on its own
//!   thread; no variables, timers or pending work survive into the next run
//! - **One way out**: `parent.postMessage` is the only channel from the
//!   sandbox to the host, and the host validates every message
//! - **No stale output**: messages are stamped host-side with the run that
//!   posted them; a superseded run can no longer reach the console
//! - **No fs, net, env or module loading** inside the sandbox
//!
//! Not provided: memory/CPU limits, execution timeouts, a DOM. A script that
//! never ends keeps its isolate busy until the next run replaces it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use preview_sandbox::{PreviewConfig, PreviewEngine, SourceBundle};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut engine = PreviewEngine::start(PreviewConfig::default()).unwrap();
//!     let bundle = SourceBundle::new(
//!         "<p>hi</p>",
//!         "p{color:red}",
//!         "console.log('a'); console.error('b');",
//!     );
//!
//!     let run = engine.schedule(&bundle).unwrap();
//!     engine.wait_settled(run).await;
//!
//!     for entry in engine.entries() {
//!         println!("{} {}", entry.method, entry.text());
//!     }
//! }
//! ```

mod bundle;
mod config;
mod document;
mod engine;
mod error;
mod host;
mod listener;
mod notice;
mod ops;
mod relay;
mod runtime;
mod scheduler;
mod sink;
mod synthesize;

pub use bundle::SourceBundle;
pub use config::PreviewConfig;
pub use document::{ExecutableDocument, InlineScript};
pub use engine::PreviewEngine;
pub use error::PreviewError;
pub use host::{IsolationHost, RunGeneration};
pub use listener::HostListener;
pub use notice::{Notice, NoticeQueue};
pub use relay::{ConsoleMethod, HostEvent, RelayMessage, RelayRejection, RunOutcome, RELAY_TAG};
pub use scheduler::UpdateScheduler;
pub use sink::{ConsoleSink, DiagnosticEntry};
pub use synthesize::{synthesize, synthesize_with};
