//! Shared ops module - used by both build.rs (snapshot) and runtime.rs
//!
//! This module contains all custom ops and the extension! macro definition.
//! It must be importable by both the main crate and the build script, so it
//! only depends on crates listed in both dependency tables.

use deno_core::{op2, OpState};

// ============================================================================
// Relay Port
// ============================================================================

/// The isolate's only way out: a host-installed forwarder for posted messages.
///
/// The host side decides what a posted message means. The port is installed
/// into `OpState` per run and stamps every message with that run's identity
/// before it leaves the isolate, so sandboxed code cannot choose which run it
/// reports for.
pub struct RelayPort {
    post: Box<dyn Fn(serde_json::Value)>,
}

impl RelayPort {
    pub fn new(post: impl Fn(serde_json::Value) + 'static) -> Self {
        Self {
            post: Box::new(post),
        }
    }

    pub fn post(&self, message: serde_json::Value) {
        (self.post)(message)
    }
}

/// `parent.postMessage(message, targetOrigin)` lands here.
///
/// The target origin is not checked: the sandbox cannot know the host's origin.
/// Messages posted before a port is installed (snapshot creation) are dropped.
#[op2]
pub fn op_relay_post(state: &mut OpState, #[serde] message: serde_json::Value) {
    if let Some(port) = state.try_borrow::<RelayPort>() {
        port.post(message);
    }
}

// ============================================================================
// Base Console
// ============================================================================

/// Sink for the sandbox's own console, i.e. the behaviour the preview
/// overrides call through to. Never reaches the host's console sink.
///
/// Sandbox output is untrusted and unbounded, so it stays below `info`.
#[op2(fast)]
pub fn op_preview_print(#[string] msg: &str, #[smi] level: i32) {
    let msg = msg.trim_end();
    if level >= 2 {
        tracing::debug!(target: "preview::sandbox", "{}", msg);
    } else {
        tracing::trace!(target: "preview::sandbox", "{}", msg);
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Timer permissions for deno_web. High-resolution time stays off inside
/// previews.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewPermissions;

impl deno_web::TimersPermission for PreviewPermissions {
    fn allow_hrtime(&mut self) -> bool {
        false
    }
}

// ============================================================================
// Extension Definition
// ============================================================================

deno_core::extension!(
    preview_runtime,
    ops = [op_relay_post, op_preview_print],
    esm_entry_point = "ext:preview_runtime/bootstrap.js",
    esm = ["ext:preview_runtime/bootstrap.js" = "src/bootstrap.js"],
);
