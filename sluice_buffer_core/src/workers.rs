//! The background flush scheduler.
use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use sluice_protocol::StreamId;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    buffer::PartitionedBuffer,
    checkpoint::CheckpointTracker,
    destination::DestinationFlush,
    detector::FlushDetector,
    error::IngestError,
    metrics::BufferMetrics,
    options::BufferOptions,
    record::FlushBatch,
    registry::{RunningFlush, RunningFlushes},
    sentinel::FlushFailure,
};

/// State shared between the scheduler and its flush tasks.
#[derive(Clone)]
pub(crate) struct FlushContext {
    pub buffer: Arc<PartitionedBuffer>,
    pub running: Arc<RunningFlushes>,
    pub detector: Arc<FlushDetector>,
    pub tracker: Arc<CheckpointTracker>,
    pub destination: Arc<dyn DestinationFlush>,
    pub failure: FlushFailure,
    pub metrics: BufferMetrics,
}

/// Runs the scheduler until drained or failed.
///
/// Cancelling `drain` switches the detector to drain mode. The scheduler then
/// exits once the buffer is empty and every flush task completed. After a
/// failure no new tasks are started, but running tasks are awaited.
///
/// A panic in the scheduler itself is recorded as a failure so that blocked
/// producers and `close` observe it.
pub(crate) async fn run_flush_scheduler(
    ctx: FlushContext,
    options: BufferOptions,
    drain: CancellationToken,
) {
    let failure = ctx.failure.clone();
    let scheduler = AssertUnwindSafe(schedule_until_drained(ctx, options, drain));
    if let Err(panic) = scheduler.catch_unwind().await {
        let message = panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(error = %message, "flush scheduler panicked");
        failure.fail(IngestError::Internal {
            message: format!("flush scheduler panicked: {message}"),
        });
    }
}

async fn schedule_until_drained(
    ctx: FlushContext,
    options: BufferOptions,
    drain: CancellationToken,
) {
    let worker_count = options.effective_worker_count();
    let mut ticker = tokio::time::interval(options.effective_poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tasks = FuturesUnordered::new();
    let mut draining = false;

    loop {
        tokio::select! {
            _ = ctx.failure.failed() => {
                debug!("flush failed, no new flushes will be scheduled");
                break;
            }
            _ = drain.cancelled(), if !draining => {
                info!(
                    buffered_bytes = ctx.buffer.global_size_bytes(),
                    running = tasks.len(),
                    "draining buffer"
                );
                draining = true;
                ctx.detector.close();
                schedule_flushes(&ctx, worker_count, &mut tasks);
            }
            _ = ticker.tick() => {
                schedule_flushes(&ctx, worker_count, &mut tasks);
            }
            completed = tasks.next(), if !tasks.is_empty() => {
                if let Some(Err(err)) = completed {
                    handle_task_panic(&ctx, err);
                }

                schedule_flushes(&ctx, worker_count, &mut tasks);
            }
        }

        if draining && tasks.is_empty() && ctx.buffer.is_empty() {
            debug!("buffer drained");
            break;
        }
    }

    while let Some(completed) = tasks.next().await {
        if let Err(err) = completed {
            handle_task_panic(&ctx, err);
        }
    }
}

fn schedule_flushes(
    ctx: &FlushContext,
    worker_count: usize,
    tasks: &mut FuturesUnordered<JoinHandle<()>>,
) {
    while tasks.len() < worker_count && !ctx.failure.is_failed() {
        let Some(stream) = ctx.detector.next_stream_to_flush(None) else {
            break;
        };

        let running = ctx.running.register(stream.clone());
        tasks.push(tokio::spawn(flush_stream(ctx.clone(), stream, running)));
    }
}

fn handle_task_panic(ctx: &FlushContext, err: tokio::task::JoinError) {
    error!(error = %err, "flush task terminated abnormally");
    ctx.failure.fail(IngestError::Internal {
        message: format!("flush task terminated abnormally: {err}"),
    });
}

async fn flush_stream(ctx: FlushContext, stream: StreamId, running: RunningFlush) {
    let mut max_bytes = ctx.detector.optimal_batch_size();
    if ctx.detector.is_closed() {
        max_bytes = max_bytes.max(1);
    }

    let records = ctx.buffer.claim_batch(&stream, max_bytes);
    if records.is_empty() {
        return;
    }

    let batch = FlushBatch::new(records);
    let size_bytes = batch.size_bytes();
    let record_count = batch.record_count() as u64;
    let epochs = batch.epochs().clone();
    running.set_size(size_bytes);

    debug!(
        stream = %stream,
        size_bytes,
        record_count,
        "flushing batch"
    );

    match ctx.destination.flush(&stream, batch).await {
        Ok(()) => {
            ctx.metrics.flushed_records.add(record_count, &[]);
            ctx.metrics.flushed_bytes.add(size_bytes, &[]);
            ctx.tracker.records_flushed(&epochs);
        }
        Err(err) => {
            error!(stream = %stream, error = %err, "failed to flush batch");
            ctx.metrics.failed_flushes.add(1, &[]);
            ctx.failure.fail(IngestError::Flush {
                stream: stream.clone(),
                source: Arc::from(err),
            });
        }
    }

    drop(running);
}
