//! Interfaces implemented by the destination connector.
use std::collections::BTreeMap;

use async_trait::async_trait;
use sluice_protocol::StreamId;

use crate::{checkpoint::ReleasedCheckpoint, record::FlushBatch};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Writes batches of records to the destination.
#[async_trait]
pub trait DestinationFlush: Send + Sync + 'static {
    /// Writes `batch` to the destination.
    ///
    /// Returning an error is fatal: the write path stops accepting records and
    /// reports the error to its caller. Retrying is up to the implementation.
    async fn flush(&self, stream: &StreamId, batch: FlushBatch) -> Result<(), BoxError>;

    /// The preferred size of a batch, in bytes.
    fn optimal_batch_size_bytes(&self) -> u64;

    /// Queue size above which a stream is flushed.
    fn queue_flush_threshold_bytes(&self) -> u64 {
        self.optimal_batch_size_bytes()
    }
}

/// Records accepted by the gateway for a stream during the sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSyncSummary {
    pub records_accepted: u64,
}

/// Setup and teardown hooks run around the sync.
#[async_trait]
pub trait LifecycleHooks: Send + Sync + 'static {
    async fn on_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_close(
        &self,
        _has_failed: bool,
        _summaries: &BTreeMap<StreamId, StreamSyncSummary>,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleHooks;

#[async_trait]
impl LifecycleHooks for NoopLifecycleHooks {}

/// Receives checkpoints once all the records before them are durable.
pub trait CheckpointEmitter: Send + Sync + 'static {
    fn emit(&self, checkpoint: ReleasedCheckpoint);
}

impl<F> CheckpointEmitter for F
where
    F: Fn(ReleasedCheckpoint) + Send + Sync + 'static,
{
    fn emit(&self, checkpoint: ReleasedCheckpoint) {
        self(checkpoint)
    }
}
