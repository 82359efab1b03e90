//! Short user-facing notices ("Code executed!", "Console cleared").
//!
//! Host UI plumbing, kept apart from the console sink: notices are
//! about the host's actions, diagnostics are about the sandbox.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Bounded FIFO of notices; the oldest is dropped when full.
#[derive(Debug)]
pub struct NoticeQueue {
    capacity: usize,
    queue: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            message: message.into(),
            raised_at: Utc::now(),
        });
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
