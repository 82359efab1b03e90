//! Host listener: the receiving end of every sandbox's relay.
//!
//! Runs as a single task draining one ordered channel. Malformed messages and
//! messages from superseded runs are dropped without a trace: a hostile or
//! broken preview must not be able to reach the host's own logs.

use crate::host::RunGeneration;
use crate::relay::{HostEvent, RelayMessage};
use crate::sink::{ConsoleSink, DiagnosticEntry};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

pub struct HostListener {
    sink: ConsoleSink,
    settled: watch::Sender<RunGeneration>,
}

impl HostListener {
    pub fn new(sink: ConsoleSink) -> Self {
        let (settled, _) = watch::channel(RunGeneration::NONE);
        Self { sink, settled }
    }

    /// Highest generation whose run has settled and whose messages have all
    /// been processed.
    pub fn settled(&self) -> watch::Receiver<RunGeneration> {
        self.settled.subscribe()
    }

    /// Validate one posted message and append it if it belongs to the active
    /// run. Returns whether the sink changed.
    pub fn accept(&self, generation: RunGeneration, payload: &Value) -> bool {
        let Ok(message) = RelayMessage::from_value(payload) else {
            return false;
        };
        let entry = DiagnosticEntry::new(message.method, message.args);
        self.sink.append_from(generation, entry)
    }

    pub fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::Posted {
                generation,
                payload,
            } => {
                self.accept(generation, &payload);
            }
            HostEvent::Settled { generation, .. } => {
                self.settled.send_if_modified(|latest| {
                    if generation > *latest {
                        *latest = generation;
                        true
                    } else {
                        false
                    }
                });
            }
        }
    }

    /// Drain `events` until every sender is gone.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!(target: "preview::listener", "relay channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{ConsoleMethod, RunOutcome};
    use serde_json::json;

    fn started() -> (HostListener, ConsoleSink, RunGeneration) {
        let sink = ConsoleSink::new();
        let generation = RunGeneration::NONE.next();
        sink.begin_run(generation);
        (HostListener::new(sink.clone()), sink, generation)
    }

    #[test]
    fn test_accepts_relay_messages_in_order() {
        let (listener, sink, run) = started();

        let log = json!({"type": "console", "method": "log", "args": ["a"]});
        let error = json!({"type": "console", "method": "error", "args": ["b"]});
        assert!(listener.accept(run, &log));
        assert!(listener.accept(run, &error));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            (entries[0].method, entries[0].args.clone()),
            (ConsoleMethod::Log, vec![json!("a")])
        );
        assert_eq!(
            (entries[1].method, entries[1].args.clone()),
            (ConsoleMethod::Error, vec![json!("b")])
        );
    }

    #[test]
    fn test_malformed_messages_do_not_touch_the_sink() {
        let (listener, sink, run) = started();
        let before = sink.revision();

        for payload in [
            json!({"type": "reload"}),
            json!({"type": "console", "args": ["x"]}),
            json!({"type": "console", "method": "debug", "args": ["x"]}),
            json!({"type": "console", "method": "log"}),
            json!("console"),
            json!(42),
        ] {
            assert!(!listener.accept(run, &payload));
        }

        assert!(sink.is_empty());
        assert_eq!(sink.revision(), before);
    }

    #[test]
    fn test_superseded_run_is_dropped() {
        let (listener, sink, first) = started();
        let second = first.next();
        sink.begin_run(second);

        listener.handle(HostEvent::Posted {
            generation: first,
            payload: json!({"type": "console", "method": "log", "args": ["late"]}),
        });
        listener.handle(HostEvent::Posted {
            generation: second,
            payload: json!({"type": "console", "method": "log", "args": ["fresh"]}),
        });

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text(), "fresh");
    }

    #[test]
    fn test_settled_only_moves_forward() {
        let (listener, _sink, first) = started();
        let settled = listener.settled();
        let second = first.next();

        listener.handle(HostEvent::Settled {
            generation: second,
            outcome: RunOutcome::Completed,
        });
        listener.handle(HostEvent::Settled {
            generation: first,
            outcome: RunOutcome::TornDown,
        });

        assert_eq!(*settled.borrow(), second);
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let (listener, sink, run) = started();
        let mut settled = listener.settled();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(listener.run(rx));

        tx.send(HostEvent::Posted {
            generation: run,
            payload: json!({"type": "console", "method": "warn", "args": ["careful"]}),
        })
        .unwrap();
        tx.send(HostEvent::Settled {
            generation: run,
            outcome: RunOutcome::Completed,
        })
        .unwrap();

        settled.wait_for(|g| *g >= run).await.unwrap();
        assert_eq!(sink.entries()[0].method, ConsoleMethod::Warn);

        drop(tx);
        task.await.unwrap();
    }
}
