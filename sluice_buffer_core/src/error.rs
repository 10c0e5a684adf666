use std::{error::Error, sync::Arc};

use sluice_protocol::{ProtocolError, StreamId};
use snafu::Snafu;

use crate::{destination::BoxError, gateway::GatewayState};

/// Errors raised by the write path.
///
/// Errors are cloneable because the first flush failure is reported to
/// every subsequent caller.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// The inbound message could not be parsed.
    #[snafu(display("failed to parse message"))]
    Parse { source: ProtocolError },
    /// The destination failed to flush a batch.
    #[snafu(display("failed to flush stream {stream}"))]
    Flush {
        stream: StreamId,
        #[snafu(source(from(BoxError, Arc::from)))]
        source: Arc<dyn Error + Send + Sync>,
    },
    /// A lifecycle hook failed.
    #[snafu(display("{hook} hook failed"))]
    Hook {
        hook: &'static str,
        #[snafu(source(from(BoxError, Arc::from)))]
        source: Arc<dyn Error + Send + Sync>,
    },
    /// The gateway was used outside of its lifecycle.
    #[snafu(display("cannot {operation} a gateway that is {state}"))]
    InvalidState {
        operation: &'static str,
        state: GatewayState,
    },
    /// A background task terminated abnormally.
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

impl IngestError {
    pub fn is_flush(&self) -> bool {
        matches!(self, IngestError::Flush { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, IngestError::Parse { .. })
    }
}
