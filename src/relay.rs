//! Diagnostic relay protocol.
//!
//! The only message the host understands from a sandbox:
//!
//! ```json
//! { "type": "console", "method": "log" | "error" | "warn", "args": [ ... ] }
//! ```
//!
//! Anything else that arrives on the channel is not a relay message. Rejection
//! is an ordinary value ([`RelayRejection`]) so callers can drop it without
//! any error path being involved.

use crate::host::RunGeneration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wire tag carried in the `type` field.
pub const RELAY_TAG: &str = "console";

/// Console methods a sandbox may relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    Log,
    Error,
    Warn,
}

impl ConsoleMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "log" => Some(Self::Log),
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Error => "error",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated diagnostic relayed out of a sandbox.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage {
    pub method: ConsoleMethod,
    pub args: Vec<Value>,
}

/// Why an inbound message is not a [`RelayMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRejection {
    NotAnObject,
    WrongTag,
    MissingMethod,
    UnknownMethod,
    MissingArgs,
}

impl RelayMessage {
    pub fn new(method: ConsoleMethod, args: Vec<Value>) -> Self {
        Self { method, args }
    }

    /// Validate an inbound message.
    pub fn from_value(value: &Value) -> Result<Self, RelayRejection> {
        let object = value.as_object().ok_or(RelayRejection::NotAnObject)?;

        if object.get("type").and_then(Value::as_str) != Some(RELAY_TAG) {
            return Err(RelayRejection::WrongTag);
        }

        let method = match object.get("method") {
            None | Some(Value::Null) => return Err(RelayRejection::MissingMethod),
            Some(Value::String(name)) => {
                ConsoleMethod::parse(name).ok_or(RelayRejection::UnknownMethod)?
            }
            Some(_) => return Err(RelayRejection::UnknownMethod),
        };

        let args = object
            .get("args")
            .and_then(Value::as_array)
            .ok_or(RelayRejection::MissingArgs)?
            .clone();

        Ok(Self { method, args })
    }

    /// The wire form, as the synthesized preamble posts it.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": RELAY_TAG,
            "method": self.method.as_str(),
            "args": self.args,
        })
    }
}

/// How a run ended from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every script ran and the event loop drained.
    Completed,
    /// Replaced by a newer run or dropped with the host.
    TornDown,
}

/// Everything delivered to the host listener, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Something a sandbox posted. Unvalidated; `generation` is stamped by the
    /// host side of the relay, never by the sandbox.
    Posted {
        generation: RunGeneration,
        payload: Value,
    },
    /// A run thread finished. Sent after every message that run posted.
    Settled {
        generation: RunGeneration,
        outcome: RunOutcome,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_each_method() {
        for (name, method) in [
            ("log", ConsoleMethod::Log),
            ("error", ConsoleMethod::Error),
            ("warn", ConsoleMethod::Warn),
        ] {
            let value = json!({"type": "console", "method": name, "args": ["a", 1]});
            let message = RelayMessage::from_value(&value).unwrap();
            assert_eq!(message.method, method);
            assert_eq!(message.args, vec![json!("a"), json!(1)]);
        }
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let cases = [
            (json!("console"), RelayRejection::NotAnObject),
            (json!(null), RelayRejection::NotAnObject),
            (json!([1, 2]), RelayRejection::NotAnObject),
            (json!({"method": "log", "args": []}), RelayRejection::WrongTag),
            (json!({"type": "reload", "method": "log", "args": []}), RelayRejection::WrongTag),
            (json!({"type": 1, "method": "log", "args": []}), RelayRejection::WrongTag),
            (json!({"type": "console", "args": []}), RelayRejection::MissingMethod),
            (
                json!({"type": "console", "method": null, "args": []}),
                RelayRejection::MissingMethod,
            ),
            (
                json!({"type": "console", "method": "info", "args": []}),
                RelayRejection::UnknownMethod,
            ),
            (
                json!({"type": "console", "method": "LOG", "args": []}),
                RelayRejection::UnknownMethod,
            ),
            (json!({"type": "console", "method": 3, "args": []}), RelayRejection::UnknownMethod),
            (json!({"type": "console", "method": "log"}), RelayRejection::MissingArgs),
            (
                json!({"type": "console", "method": "log", "args": "a"}),
                RelayRejection::MissingArgs,
            ),
        ];

        for (value, expected) in cases {
            assert_eq!(RelayMessage::from_value(&value), Err(expected), "{value}");
        }
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let value = json!({"type": "console", "method": "warn", "args": [], "stamp": 12});
        let message = RelayMessage::from_value(&value).unwrap();
        assert_eq!(message, RelayMessage::new(ConsoleMethod::Warn, vec![]));
    }

    #[test]
    fn test_wire_form_validates() {
        let message =
            RelayMessage::new(ConsoleMethod::Error, vec![json!("JS Error:"), json!("boom")]);
        assert_eq!(RelayMessage::from_value(&message.to_value()), Ok(message));
    }
}
