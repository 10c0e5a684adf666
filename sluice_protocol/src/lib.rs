//! Protocol messages accepted by the sluice write path.
//!
//! The upstream extractor emits one JSON message per line. Only two message
//! kinds are ever buffered: data records and state (checkpoint) markers.
//! Everything else is decoded as [`ProtocolMessage::Unsupported`] and
//! rejected by [`deserialize_message`].
pub mod error;
pub mod message;
pub mod stream;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use message::{
    AcceptedMessage, CheckpointMessage, ProtocolMessage, RecordMessage, StateType, decode_message,
    deserialize_message,
};
pub use stream::StreamId;
