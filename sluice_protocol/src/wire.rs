//! Helpers to produce wire messages.
//!
//! These are used by the generator command and by tests, real extractors
//! produce their own messages.
use serde_json::{Value, json};

use crate::stream::StreamId;

/// Serializes a record message for `stream`.
pub fn record_line(stream: &StreamId, data: &Value, emitted_at: Option<i64>) -> String {
    let mut record = json!({
        "stream": stream.name,
        "data": data,
    });

    if let Some(namespace) = &stream.namespace {
        record["namespace"] = json!(namespace);
    }

    if let Some(emitted_at) = emitted_at {
        record["emitted_at"] = json!(emitted_at);
    }

    json!({
        "type": "RECORD",
        "record": record,
    })
    .to_string()
}

/// Serializes a per-stream state message.
pub fn stream_state_line(stream: &StreamId, state: &Value) -> String {
    json!({
        "type": "STATE",
        "state": {
            "type": "STREAM",
            "stream": {
                "stream_descriptor": stream,
                "stream_state": state,
            },
        },
    })
    .to_string()
}

/// Serializes a global state message.
pub fn global_state_line(shared_state: &Value) -> String {
    json!({
        "type": "STATE",
        "state": {
            "type": "GLOBAL",
            "global": {
                "shared_state": shared_state,
            },
        },
    })
    .to_string()
}

/// Serializes a log message.
pub fn log_line(level: &str, message: &str) -> String {
    json!({
        "type": "LOG",
        "log": {
            "level": level,
            "message": message,
        },
    })
    .to_string()
}
