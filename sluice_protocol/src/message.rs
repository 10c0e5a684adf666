//! Decoding of inbound protocol messages.
//!
//! Decoding is partial: only the fields needed to route a message are
//! inspected. Record payloads and state markers are kept as the exact text
//! received so that downstream writers and the checkpoint emitter see the
//! bytes produced by the upstream serializer.
use serde::Deserialize;
use serde_json::value::RawValue;
use snafu::ResultExt;

use crate::{
    error::{InvalidJsonSnafu, MissingPayloadSnafu, MissingTypeSnafu, Result, UnsupportedTypeSnafu},
    stream::StreamId,
};

const RECORD_TYPE: &str = "RECORD";
const STATE_TYPE: &str = "STATE";

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// A data record.
    Record(RecordMessage),
    /// A state marker.
    Checkpoint(CheckpointMessage),
    /// Any other message type, such as logs or traces.
    Unsupported { message_type: String },
}

/// A message that can be buffered by the write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedMessage {
    Record(RecordMessage),
    Checkpoint(CheckpointMessage),
}

/// A data record destined to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMessage {
    /// The stream the record belongs to.
    pub stream: StreamId,
    /// The record payload, exactly as it appeared in the message.
    pub serialized: String,
    /// When the record was emitted by the source, in milliseconds since the epoch.
    pub emitted_at: Option<i64>,
}

/// A state marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointMessage {
    /// The full original message.
    pub serialized: String,
    /// The kind of state carried by the marker.
    pub state_type: StateType,
    /// The stream the state refers to, for per-stream state.
    pub stream: Option<StreamId>,
}

/// The scope of a state marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateType {
    Stream,
    Global,
    #[default]
    Legacy,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    message_type: Option<String>,
    #[serde(borrow)]
    record: Option<&'a RawValue>,
    #[serde(borrow)]
    state: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct RecordEnvelope<'a> {
    stream: String,
    namespace: Option<String>,
    #[serde(borrow)]
    data: Option<&'a RawValue>,
    emitted_at: Option<i64>,
}

#[derive(Default, Deserialize)]
struct StateEnvelope {
    #[serde(rename = "type", default)]
    state_type: StateType,
    stream: Option<StreamStateEnvelope>,
}

#[derive(Deserialize)]
struct StreamStateEnvelope {
    stream_descriptor: Option<StreamId>,
}

/// Decodes a single serialized message.
///
/// Messages of unknown type are returned as [`ProtocolMessage::Unsupported`],
/// malformed records and state markers are errors.
pub fn decode_message(raw: &str) -> Result<ProtocolMessage> {
    let envelope: Envelope<'_> = serde_json::from_str(raw).context(InvalidJsonSnafu {})?;

    let Some(message_type) = envelope.message_type else {
        return MissingTypeSnafu {}.fail();
    };

    match message_type.as_str() {
        RECORD_TYPE => {
            let Some(record) = envelope.record else {
                return MissingPayloadSnafu {
                    message_type: RECORD_TYPE,
                    field: "record",
                }
                .fail();
            };
            decode_record(record).map(ProtocolMessage::Record)
        }
        STATE_TYPE => {
            let Some(state) = envelope.state else {
                return MissingPayloadSnafu {
                    message_type: STATE_TYPE,
                    field: "state",
                }
                .fail();
            };
            Ok(ProtocolMessage::Checkpoint(decode_state(raw, state)))
        }
        _ => Ok(ProtocolMessage::Unsupported { message_type }),
    }
}

/// Decodes a message that must be either a record or a state marker.
pub fn deserialize_message(raw: &str) -> Result<AcceptedMessage> {
    match decode_message(raw)? {
        ProtocolMessage::Record(record) => Ok(AcceptedMessage::Record(record)),
        ProtocolMessage::Checkpoint(checkpoint) => Ok(AcceptedMessage::Checkpoint(checkpoint)),
        ProtocolMessage::Unsupported { message_type } => {
            UnsupportedTypeSnafu { message_type }.fail()
        }
    }
}

fn decode_record(record: &RawValue) -> Result<RecordMessage> {
    let envelope: RecordEnvelope<'_> =
        serde_json::from_str(record.get()).context(InvalidJsonSnafu {})?;

    let serialized = envelope
        .data
        .map(|data| data.get().to_string())
        .unwrap_or_else(|| "null".to_string());

    Ok(RecordMessage {
        stream: StreamId::new(envelope.namespace, envelope.stream),
        serialized,
        emitted_at: envelope.emitted_at,
    })
}

fn decode_state(raw: &str, state: &RawValue) -> CheckpointMessage {
    // The state payload is opaque, we only peek at it to improve logging.
    let envelope: StateEnvelope = serde_json::from_str(state.get()).unwrap_or_default();

    CheckpointMessage {
        serialized: raw.to_string(),
        state_type: envelope.state_type,
        stream: envelope.stream.and_then(|s| s.stream_descriptor),
    }
}

impl RecordMessage {
    /// Size of the serialized payload in bytes.
    pub fn payload_size(&self) -> u64 {
        self.serialized.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn test_decode_record_keeps_payload_text() {
        let raw = r#"{"type":"RECORD","record":{"stream":"users","namespace":"public","data":{"z": 1,  "a":[1,2]},"emitted_at":42}}"#;
        let ProtocolMessage::Record(record) = decode_message(raw).unwrap() else {
            panic!("expected record");
        };

        assert_eq!(record.stream, StreamId::qualified("public", "users"));
        assert_eq!(record.serialized, r#"{"z": 1,  "a":[1,2]}"#);
        assert_eq!(record.emitted_at, Some(42));
    }

    #[test]
    fn test_decode_record_without_data() {
        let raw = r#"{"type":"RECORD","record":{"stream":"users"}}"#;
        let ProtocolMessage::Record(record) = decode_message(raw).unwrap() else {
            panic!("expected record");
        };

        assert_eq!(record.stream, StreamId::unqualified("users"));
        assert_eq!(record.serialized, "null");
        assert_eq!(record.payload_size(), 4);
    }

    #[test]
    fn test_decode_record_without_stream() {
        let raw = r#"{"type":"RECORD","record":{"data":{}}}"#;
        let err = decode_message(raw).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson { .. }));
    }

    #[test]
    fn test_decode_state_metadata() {
        let raw = r#"{"type":"STATE","state":{"type":"STREAM","stream":{"stream_descriptor":{"name":"users","namespace":"public"},"stream_state":{"cursor":3}}}}"#;
        let ProtocolMessage::Checkpoint(checkpoint) = decode_message(raw).unwrap() else {
            panic!("expected checkpoint");
        };

        assert_eq!(checkpoint.serialized, raw);
        assert_eq!(checkpoint.state_type, StateType::Stream);
        assert_eq!(
            checkpoint.stream,
            Some(StreamId::qualified("public", "users"))
        );
    }

    #[test]
    fn test_decode_opaque_state() {
        let raw = r#"{"type":"STATE","state":[1,2,3]}"#;
        let ProtocolMessage::Checkpoint(checkpoint) = decode_message(raw).unwrap() else {
            panic!("expected checkpoint");
        };

        assert_eq!(checkpoint.state_type, StateType::Legacy);
        assert_eq!(checkpoint.stream, None);
    }

    #[test]
    fn test_decode_null_state() {
        let raw = r#"{"type":"STATE","state":null}"#;
        let err = decode_message(raw).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingPayload { field: "state", .. }
        ));
    }

    #[test]
    fn test_decode_unsupported() {
        let raw = r#"{"type":"TRACE","trace":{}}"#;
        assert_eq!(
            decode_message(raw).unwrap(),
            ProtocolMessage::Unsupported {
                message_type: "TRACE".to_string()
            }
        );
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_message("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson { .. }));
    }
}
