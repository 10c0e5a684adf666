//! Asynchronous multi-stream buffering and flush scheduling.
//!
//! ## Data flow
//!
//! **Gateway**: protocol line -> [`BufferedRecord`] pushed into the [`PartitionedBuffer`],
//! or checkpoint handed to the [`CheckpointTracker`].
//!
//! **Scheduler**: [`FlushDetector`] picks a stream, a worker claims a [`FlushBatch`]
//! and hands it to the [`DestinationFlush`].
//!
//! **Completion**: flushed records are acknowledged to the tracker, which releases
//! the pending checkpoint through the [`CheckpointEmitter`] once every record
//! before it is durable.
pub mod buffer;
pub mod checkpoint;
pub mod destination;
pub mod detector;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod options;
pub mod record;
pub mod registry;
pub mod sentinel;
mod workers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use buffer::{PartitionedBuffer, StreamStats};
pub use checkpoint::{CheckpointTracker, ReleasedCheckpoint};
pub use destination::{
    BoxError, CheckpointEmitter, DestinationFlush, LifecycleHooks, NoopLifecycleHooks,
    StreamSyncSummary,
};
pub use detector::FlushDetector;
pub use error::{IngestError, Result};
pub use gateway::{GatewayState, IngestionGateway};
pub use options::{BufferOptions, MIN_POLL_INTERVAL};
pub use record::{BufferedRecord, FlushBatch};
pub use registry::{RunningFlush, RunningFlushes};
pub use sentinel::FlushFailure;
