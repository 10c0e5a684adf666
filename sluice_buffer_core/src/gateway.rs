//! The write path entry point.
use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use sluice_protocol::{AcceptedMessage, RecordMessage, StreamId, deserialize_message};
use snafu::ResultExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    buffer::PartitionedBuffer,
    checkpoint::CheckpointTracker,
    destination::{
        CheckpointEmitter, DestinationFlush, LifecycleHooks, NoopLifecycleHooks, StreamSyncSummary,
    },
    detector::FlushDetector,
    error::{HookSnafu, IngestError, InvalidStateSnafu, ParseSnafu, Result},
    metrics::BufferMetrics,
    options::BufferOptions,
    record::BufferedRecord,
    registry::RunningFlushes,
    sentinel::FlushFailure,
    workers::{FlushContext, run_flush_scheduler},
};

/// Lifecycle state of an [`IngestionGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Created,
    Started,
    Closing,
    Closed,
}

/// Accepts protocol messages, buffers records and flushes them in the background.
///
/// The gateway must be started before accepting messages and closed once the
/// input is exhausted. Closing flushes every buffered record and releases the
/// last checkpoint.
pub struct IngestionGateway {
    state: GatewayState,
    options: BufferOptions,
    ctx: FlushContext,
    hooks: Arc<dyn LifecycleHooks>,
    drain: CancellationToken,
    scheduler: Option<JoinHandle<()>>,
    records_accepted: BTreeMap<StreamId, u64>,
}

impl IngestionGateway {
    pub fn new(
        destination: Arc<dyn DestinationFlush>,
        emitter: Arc<dyn CheckpointEmitter>,
        options: BufferOptions,
    ) -> Self {
        Self::with_hooks(destination, emitter, Arc::new(NoopLifecycleHooks), options)
    }

    pub fn with_hooks(
        destination: Arc<dyn DestinationFlush>,
        emitter: Arc<dyn CheckpointEmitter>,
        hooks: Arc<dyn LifecycleHooks>,
        options: BufferOptions,
    ) -> Self {
        let metrics = BufferMetrics::default();
        let buffer = Arc::new(PartitionedBuffer::new_with_metrics(
            options.max_buffer_size.as_u64(),
            metrics.clone(),
        ));
        let running = Arc::new(RunningFlushes::new());
        let detector = Arc::new(FlushDetector::new(
            buffer.clone(),
            running.clone(),
            destination.optimal_batch_size_bytes(),
            destination.queue_flush_threshold_bytes(),
            options.staleness_window,
        ));
        let tracker = Arc::new(CheckpointTracker::new_with_metrics(
            emitter,
            metrics.clone(),
        ));

        let ctx = FlushContext {
            buffer,
            running,
            detector,
            tracker,
            destination,
            failure: FlushFailure::new(),
            metrics,
        };

        Self {
            state: GatewayState::Created,
            options,
            ctx,
            hooks,
            drain: CancellationToken::new(),
            scheduler: None,
            records_accepted: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// Runs the start hook and starts flushing in the background.
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_state("start", GatewayState::Created)?;

        self.hooks
            .on_start()
            .await
            .context(HookSnafu { hook: "on_start" })?;

        info!(
            max_buffer_size = %self.options.max_buffer_size,
            worker_count = self.options.effective_worker_count(),
            optimal_batch_size = self.ctx.detector.optimal_batch_size(),
            "starting ingestion gateway"
        );

        self.state = GatewayState::Started;
        self.scheduler = Some(tokio::spawn(run_flush_scheduler(
            self.ctx.clone(),
            self.options.clone(),
            self.drain.clone(),
        )));

        Ok(())
    }

    /// Accepts one serialized protocol message.
    ///
    /// `approximate_size` is the size used for memory accounting. If zero, the
    /// size of the record payload is used.
    ///
    /// Waits while the buffer is full. Returns the flush failure, if any
    /// happened since the last call.
    pub async fn accept(&mut self, raw: &str, approximate_size: u64) -> Result<()> {
        self.ensure_state("accept", GatewayState::Started)?;
        self.ctx.failure.check()?;

        match deserialize_message(raw).context(ParseSnafu)? {
            AcceptedMessage::Record(record) => self.accept_record(record, approximate_size).await?,
            AcceptedMessage::Checkpoint(checkpoint) => {
                debug!(
                    state_type = ?checkpoint.state_type,
                    stream = ?checkpoint.stream,
                    "checkpoint received"
                );
                self.ctx.tracker.checkpoint_received(checkpoint);
            }
        }

        self.ctx.failure.check()
    }

    /// Flushes all buffered records and stops the background tasks.
    ///
    /// Returns the first flush failure, or the close hook error.
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_state("close", GatewayState::Started)?;
        self.state = GatewayState::Closing;

        info!(
            buffered_bytes = self.ctx.buffer.global_size_bytes(),
            "closing ingestion gateway"
        );

        self.drain.cancel();
        if let Some(scheduler) = self.scheduler.take() {
            if let Err(err) = scheduler.await {
                self.ctx.failure.fail(IngestError::Internal {
                    message: format!("flush scheduler terminated abnormally: {err}"),
                });
            }
        }

        let has_failed = self.ctx.failure.is_failed();
        let summaries = self
            .records_accepted
            .iter()
            .map(|(stream, records_accepted)| {
                let summary = StreamSyncSummary {
                    records_accepted: *records_accepted,
                };
                (stream.clone(), summary)
            })
            .collect::<BTreeMap<_, _>>();

        let hook_result = self
            .hooks
            .on_close(has_failed, &summaries)
            .await
            .context(HookSnafu { hook: "on_close" });

        self.state = GatewayState::Closed;

        if let Err(error) = self.ctx.failure.check() {
            warn!(error = %error, "ingestion gateway closed after a flush failure");
            return Err(error);
        }

        hook_result?;

        if !self.ctx.tracker.release_pending() && self.ctx.tracker.has_pending() {
            warn!("pending checkpoint not released, records are still outstanding");
        }

        info!("ingestion gateway closed");

        Ok(())
    }

    async fn accept_record(&mut self, record: RecordMessage, approximate_size: u64) -> Result<()> {
        let size_bytes = if approximate_size == 0 {
            record.payload_size()
        } else {
            approximate_size
        };

        let RecordMessage {
            stream, serialized, ..
        } = record;
        let stream = stream.with_default_namespace(self.options.default_namespace.as_deref());

        tokio::select! {
            biased;
            _ = self.ctx.failure.failed() => return self.ctx.failure.check(),
            _ = self.ctx.buffer.wait_for_capacity() => {}
        }

        let epoch = self.ctx.tracker.record_enqueued();
        self.ctx.buffer.enqueue(
            stream.clone(),
            BufferedRecord::with_epoch(serialized, size_bytes, epoch),
        );

        *self.records_accepted.entry(stream).or_insert(0) += 1;
        self.ctx.metrics.accepted_records.add(1, &[]);
        self.ctx.metrics.accepted_bytes.add(size_bytes, &[]);

        Ok(())
    }

    fn ensure_state(&self, operation: &'static str, expected: GatewayState) -> Result<()> {
        if self.state != expected {
            return InvalidStateSnafu {
                operation,
                state: self.state,
            }
            .fail();
        }

        Ok(())
    }
}

impl Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayState::Created => write!(f, "created"),
            GatewayState::Started => write!(f, "started"),
            GatewayState::Closing => write!(f, "closing"),
            GatewayState::Closed => write!(f, "closed"),
        }
    }
}

impl Drop for IngestionGateway {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
        }
    }
}
