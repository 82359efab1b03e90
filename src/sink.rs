//! Console sink: the ordered diagnostic log of the current run.

use crate::host::RunGeneration;
use crate::relay::ConsoleMethod;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// One relayed diagnostic, timestamped by the host on arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    pub method: ConsoleMethod,
    pub args: Vec<Value>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticEntry {
    pub fn new(method: ConsoleMethod, args: Vec<Value>) -> Self {
        Self {
            method,
            args,
            timestamp: Utc::now(),
        }
    }

    /// Arguments joined by a single space, strings unquoted.
    pub fn text(&self) -> String {
        self.args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `[HH:MM:SS] text` in local time.
    pub fn render(&self) -> String {
        let local: DateTime<Local> = self.timestamp.into();
        format!("[{}] {}", local.format("%H:%M:%S"), self.text())
    }
}

#[derive(Debug, Default)]
struct SinkState {
    active: RunGeneration,
    entries: Vec<DiagnosticEntry>,
}

/// Shared handle to the console log.
///
/// Append, clear and run switches happen under one lock, so a clear can
/// never interleave with an append and a run switch can never let a stale
/// append through.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    state: Arc<Mutex<SinkState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSink {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(SinkState::default())),
            revision: Arc::new(revision),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Append unconditionally.
    pub fn append(&self, entry: DiagnosticEntry) {
        self.lock().entries.push(entry);
        self.bump();
    }

    /// Append only if `generation` is the active run. Returns whether the
    /// entry was kept.
    pub fn append_from(&self, generation: RunGeneration, entry: DiagnosticEntry) -> bool {
        {
            let mut state = self.lock();
            if state.active != generation {
                return false;
            }
            state.entries.push(entry);
        }
        self.bump();
        true
    }

    /// Empty the log. The only way entries are removed.
    pub fn clear(&self) {
        self.lock().entries.clear();
        self.bump();
    }

    /// Make `generation` the active run and clear the previous run's log.
    pub fn begin_run(&self, generation: RunGeneration) {
        {
            let mut state = self.lock();
            state.active = generation;
            state.entries.clear();
        }
        self.bump();
    }

    pub fn active_generation(&self) -> RunGeneration {
        self.lock().active
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Revision counter, bumped once per append and once per clear.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}
