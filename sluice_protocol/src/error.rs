use std::sync::Arc;

use snafu::Snafu;

/// Errors raised while decoding an inbound protocol message.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtocolError {
    #[snafu(display("invalid JSON message"))]
    InvalidJson {
        #[snafu(source(from(serde_json::Error, Arc::new)))]
        source: Arc<serde_json::Error>,
    },
    #[snafu(display("message does not specify a type"))]
    MissingType,
    #[snafu(display("{message_type} message is missing its `{field}` field"))]
    MissingPayload {
        message_type: &'static str,
        field: &'static str,
    },
    #[snafu(display("unsupported message type {message_type}"))]
    UnsupportedType { message_type: String },
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;
