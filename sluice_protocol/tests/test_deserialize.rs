use serde_json::json;
use sluice_protocol::{
    AcceptedMessage, ProtocolError, StateType, StreamId, deserialize_message,
    wire::{global_state_line, log_line, record_line, stream_state_line},
};

fn users_stream() -> StreamId {
    StreamId::qualified("public", "id_and_name")
}

#[test]
fn test_record_payload_matches_serialized_data() {
    let payload = json!({
        "created_at": "2022-02-01T17:02:19+00:00",
        "id": 1,
        "make": "Mazda",
        "nested_column": { "array_column": [1, 2, 3] },
    });
    let line = record_line(&users_stream(), &payload, Some(1_700_000_000_000));

    let AcceptedMessage::Record(record) = deserialize_message(&line).expect("deserialize") else {
        panic!("expected a record");
    };

    assert_eq!(record.stream, users_stream());
    assert_eq!(record.serialized, payload.to_string());
    assert_eq!(record.emitted_at, Some(1_700_000_000_000));
}

#[test]
fn test_record_with_big_decimal_payload() {
    let line = r#"{"type":"RECORD","record":{"stream":"id_and_name","namespace":"public","data":{"foo":1234567890.1234567890}}}"#;

    let AcceptedMessage::Record(record) = deserialize_message(line).expect("deserialize") else {
        panic!("expected a record");
    };

    assert_eq!(record.serialized, r#"{"foo":1234567890.1234567890}"#);
}

#[test]
fn test_record_with_empty_payload() {
    let line = record_line(&users_stream(), &json!({}), None);

    let AcceptedMessage::Record(record) = deserialize_message(&line).expect("deserialize") else {
        panic!("expected a record");
    };

    assert_eq!(record.serialized, "{}");
}

#[test]
fn test_state_keeps_full_message() {
    let line = stream_state_line(&users_stream(), &json!(1));

    let AcceptedMessage::Checkpoint(checkpoint) =
        deserialize_message(&line).expect("deserialize")
    else {
        panic!("expected a checkpoint");
    };

    assert_eq!(checkpoint.serialized, line);
    assert_eq!(checkpoint.state_type, StateType::Stream);
    assert_eq!(checkpoint.stream, Some(users_stream()));
}

#[test]
fn test_global_state() {
    let line = global_state_line(&json!({ "cursor": 2 }));

    let AcceptedMessage::Checkpoint(checkpoint) =
        deserialize_message(&line).expect("deserialize")
    else {
        panic!("expected a checkpoint");
    };

    assert_eq!(checkpoint.serialized, line);
    assert_eq!(checkpoint.state_type, StateType::Global);
    assert_eq!(checkpoint.stream, None);
}

#[test]
fn test_log_message_is_rejected() {
    let err = deserialize_message(&log_line("INFO", "hello")).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnsupportedType { ref message_type } if message_type == "LOG"
    ));
}

#[test]
fn test_state_without_type_is_rejected() {
    let line = json!({
        "state": {
            "type": "STREAM",
            "stream": {
                "stream_descriptor": users_stream(),
                "stream_state": 1,
            },
        },
    })
    .to_string();

    let err = deserialize_message(&line).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingType));
}

#[test]
fn test_state_without_payload_is_rejected() {
    let err = deserialize_message(r#"{"type":"STATE"}"#).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::MissingPayload {
            message_type: "STATE",
            field: "state"
        }
    ));
}

#[test]
fn test_record_without_payload_is_rejected() {
    let err = deserialize_message(r#"{"type":"RECORD"}"#).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::MissingPayload {
            message_type: "RECORD",
            field: "record"
        }
    ));
}
