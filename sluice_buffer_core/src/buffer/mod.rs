//! Memory-bounded, per-stream record buffer.
//!
//! Each stream has its own lock so that producers and flush workers touching
//! different streams never contend. The global size is an atomic updated while
//! holding the stream lock, so it always equals the sum of the stream sizes
//! once the lock is released.
use std::{
    pin::pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use parking_lot::Mutex;
use sluice_protocol::StreamId;
use tokio::{sync::Notify, time::Instant};

use crate::{metrics::BufferMetrics, record::BufferedRecord};

use self::stream::StreamBuffer;

mod stream;

/// Buffered records partitioned by stream.
pub struct PartitionedBuffer {
    streams: DashMap<StreamId, Arc<Mutex<StreamBuffer>>>,
    global_size: AtomicU64,
    max_size: u64,
    space_available: Notify,
    metrics: BufferMetrics,
}

/// Point-in-time view of a stream's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    pub stream: StreamId,
    pub size_bytes: u64,
    pub record_count: usize,
    pub last_record_at: Option<Instant>,
}

impl PartitionedBuffer {
    pub fn new(max_size: u64) -> Self {
        Self::new_with_metrics(max_size, BufferMetrics::default())
    }

    pub fn new_with_metrics(max_size: u64, metrics: BufferMetrics) -> Self {
        Self {
            streams: DashMap::new(),
            global_size: AtomicU64::new(0),
            max_size,
            space_available: Notify::new(),
            metrics,
        }
    }

    /// Appends a record to the tail of the stream's queue.
    ///
    /// This never blocks, callers that want to respect the memory limit should
    /// wait on [`PartitionedBuffer::wait_for_capacity`] first.
    pub fn enqueue(&self, stream: StreamId, record: BufferedRecord) {
        let size_bytes = record.size_bytes;
        let queue = self.stream_queue(stream);
        let mut queue = queue.lock();
        queue.push(record);
        self.global_size.fetch_add(size_bytes, Ordering::AcqRel);
        self.metrics.buffered_bytes.add(size_bytes as i64, &[]);
    }

    /// Removes up to `max_bytes` worth of records from the head of the stream's queue.
    pub fn claim_batch(&self, stream: &StreamId, max_bytes: u64) -> Vec<BufferedRecord> {
        let Some(queue) = self.streams.get(stream).map(|q| q.value().clone()) else {
            return Vec::new();
        };

        let claimed = {
            let mut queue = queue.lock();
            let before = queue.size_bytes();
            let claimed = queue.claim(max_bytes);
            let claimed_bytes = before - queue.size_bytes();
            self.global_size.fetch_sub(claimed_bytes, Ordering::AcqRel);
            self.metrics.buffered_bytes.add(-(claimed_bytes as i64), &[]);
            claimed
        };

        if !claimed.is_empty() {
            self.space_available.notify_waiters();
        }

        claimed
    }

    /// Waits until the buffer has room for another record.
    ///
    /// An empty buffer always has room, even for a record larger than the limit.
    pub async fn wait_for_capacity(&self) {
        loop {
            let mut notified = pin!(self.space_available.notified());
            notified.as_mut().enable();

            if self.has_capacity() {
                return;
            }

            notified.await;
        }
    }

    pub fn has_capacity(&self) -> bool {
        let global_size = self.global_size_bytes();
        global_size == 0 || global_size < self.max_size
    }

    /// Buffered bytes for a stream, `None` if the stream was never seen.
    pub fn queue_size_bytes(&self, stream: &StreamId) -> Option<u64> {
        self.streams.get(stream).map(|q| q.lock().size_bytes())
    }

    /// Arrival time of the most recent buffered record of a stream.
    pub fn time_of_last_record(&self, stream: &StreamId) -> Option<Instant> {
        self.streams
            .get(stream)
            .and_then(|q| q.lock().last_record_at())
    }

    /// Streams with buffered data.
    pub fn buffered_streams(&self) -> Vec<StreamId> {
        self.streams
            .iter()
            .filter(|entry| entry.value().lock().size_bytes() > 0)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Statistics for every stream with buffered data.
    pub fn stream_stats(&self) -> Vec<StreamStats> {
        self.streams
            .iter()
            .filter_map(|entry| {
                let queue = entry.value().lock();
                if queue.size_bytes() == 0 {
                    return None;
                }

                Some(StreamStats {
                    stream: entry.key().clone(),
                    size_bytes: queue.size_bytes(),
                    record_count: queue.len(),
                    last_record_at: queue.last_record_at(),
                })
            })
            .collect()
    }

    pub fn global_size_bytes(&self) -> u64 {
        self.global_size.load(Ordering::Acquire)
    }

    pub fn max_global_size_bytes(&self) -> u64 {
        self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.global_size_bytes() == 0
    }

    fn stream_queue(&self, stream: StreamId) -> Arc<Mutex<StreamBuffer>> {
        if let Some(queue) = self.streams.get(&stream) {
            return queue.value().clone();
        }

        self.streams.entry(stream).or_default().value().clone()
    }
}
