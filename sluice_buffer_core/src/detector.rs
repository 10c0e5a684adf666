//! Decides which stream should be flushed next.
use std::{
    cmp::Reverse,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use sluice_protocol::StreamId;
use tokio::time::Instant;
use tracing::debug;

use crate::{buffer::PartitionedBuffer, registry::RunningFlushes};

pub struct FlushDetector {
    buffer: Arc<PartitionedBuffer>,
    running: Arc<RunningFlushes>,
    optimal_batch_size: u64,
    flush_threshold: u64,
    staleness_window: Duration,
    closed: AtomicBool,
}

impl FlushDetector {
    pub fn new(
        buffer: Arc<PartitionedBuffer>,
        running: Arc<RunningFlushes>,
        optimal_batch_size: u64,
        flush_threshold: u64,
        staleness_window: Duration,
    ) -> Self {
        Self {
            buffer,
            running,
            optimal_batch_size,
            flush_threshold,
            staleness_window,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the next stream that should be flushed, if any.
    ///
    /// Streams are considered largest queue first, then by oldest most recent
    /// record, then by stream id. A stream is selected if the bytes not yet
    /// covered by running flushes exceed the threshold, or if its most recent
    /// record is older than the staleness window and some of its bytes are not
    /// yet covered by running flushes.
    ///
    /// Once closed the threshold is zero, so any stream with data not covered
    /// by running flushes is selected.
    pub fn next_stream_to_flush(&self, threshold_override: Option<u64>) -> Option<StreamId> {
        let threshold = if self.is_closed() {
            0
        } else {
            threshold_override.unwrap_or(self.flush_threshold)
        };

        let mut candidates = self.buffer.stream_stats();
        candidates.sort_by(|a, b| {
            Reverse(a.size_bytes)
                .cmp(&Reverse(b.size_bytes))
                .then_with(|| a.last_record_at.cmp(&b.last_record_at))
                .then_with(|| a.stream.cmp(&b.stream))
        });

        let now = Instant::now();
        for candidate in candidates {
            if candidate.size_bytes == 0 {
                continue;
            }

            let running =
                self.estimate_size_of_running_workers(&candidate.stream, candidate.size_bytes);
            let pending = candidate.size_bytes.saturating_sub(running);

            if pending > threshold {
                debug!(
                    stream = %candidate.stream,
                    queue_size = candidate.size_bytes,
                    running_size = running,
                    threshold,
                    "size trigger fired"
                );
                return Some(candidate.stream);
            }

            let is_stale = candidate
                .last_record_at
                .is_some_and(|last| now.saturating_duration_since(last) > self.staleness_window);

            if is_stale && pending > 0 {
                debug!(
                    stream = %candidate.stream,
                    queue_size = candidate.size_bytes,
                    staleness_window = ?self.staleness_window,
                    "time trigger fired"
                );
                return Some(candidate.stream);
            }
        }

        None
    }

    /// Estimates how many of the stream's queued bytes running flushes will take.
    ///
    /// Flushes that didn't claim their batch yet are assumed to take a full
    /// batch, capped at the queue size.
    pub fn estimate_size_of_running_workers(&self, stream: &StreamId, queue_size: u64) -> u64 {
        self.running
            .sizes(stream)
            .into_iter()
            .map(|size| size.unwrap_or_else(|| queue_size.min(self.optimal_batch_size)))
            .sum()
    }

    /// Switches to drain mode.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn optimal_batch_size(&self) -> u64 {
        self.optimal_batch_size
    }
}
