#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
pub use sluice_buffer_core::test_utils::CollectingEmitter;
use sluice_buffer_core::{
    BoxError, BufferOptions, DestinationFlush, FlushBatch, IngestionGateway, LifecycleHooks,
    StreamSyncSummary,
};
use sluice_protocol::StreamId;

/// Destination that keeps every flushed payload, grouped by stream.
#[derive(Debug)]
pub struct CollectingDestination {
    optimal_batch_size: u64,
    flush_delay: Duration,
    flushed: Mutex<BTreeMap<StreamId, Vec<String>>>,
    flush_count: AtomicUsize,
}

/// Destination that fails every flush.
#[derive(Debug)]
pub struct FailingDestination {
    optimal_batch_size: u64,
    flush_delay: Duration,
}

/// Hooks that remember what `on_close` was called with.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    fail_on_start: bool,
    closed_with: Mutex<Option<(bool, BTreeMap<StreamId, StreamSyncSummary>)>>,
}

#[derive(Debug, snafu::Snafu)]
pub enum TestError {
    #[snafu(display("destination unavailable"))]
    DestinationUnavailable,
}

impl CollectingDestination {
    pub fn new(optimal_batch_size: u64) -> Self {
        Self {
            optimal_batch_size,
            flush_delay: Duration::ZERO,
            flushed: Mutex::new(BTreeMap::new()),
            flush_count: AtomicUsize::new(0),
        }
    }

    pub fn with_flush_delay(mut self, flush_delay: Duration) -> Self {
        self.flush_delay = flush_delay;
        self
    }

    pub fn flushed(&self, stream: &StreamId) -> Vec<String> {
        self.flushed.lock().get(stream).cloned().unwrap_or_default()
    }

    pub fn flushed_streams(&self) -> Vec<StreamId> {
        self.flushed.lock().keys().cloned().collect()
    }

    pub fn total_flushed(&self) -> usize {
        self.flushed.lock().values().map(Vec::len).sum()
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DestinationFlush for CollectingDestination {
    async fn flush(&self, stream: &StreamId, batch: FlushBatch) -> Result<(), BoxError> {
        if !self.flush_delay.is_zero() {
            tokio::time::sleep(self.flush_delay).await;
        }

        let payloads = batch.map(|record| record.serialized).collect::<Vec<_>>();
        self.flushed
            .lock()
            .entry(stream.clone())
            .or_default()
            .extend(payloads);
        self.flush_count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn optimal_batch_size_bytes(&self) -> u64 {
        self.optimal_batch_size
    }
}

impl FailingDestination {
    pub fn new(optimal_batch_size: u64) -> Self {
        Self {
            optimal_batch_size,
            flush_delay: Duration::ZERO,
        }
    }

    pub fn with_flush_delay(mut self, flush_delay: Duration) -> Self {
        self.flush_delay = flush_delay;
        self
    }
}

#[async_trait]
impl DestinationFlush for FailingDestination {
    async fn flush(&self, _stream: &StreamId, _batch: FlushBatch) -> Result<(), BoxError> {
        if !self.flush_delay.is_zero() {
            tokio::time::sleep(self.flush_delay).await;
        }
        Err(Box::new(TestError::DestinationUnavailable))
    }

    fn optimal_batch_size_bytes(&self) -> u64 {
        self.optimal_batch_size
    }
}

impl RecordingHooks {
    pub fn failing_on_start() -> Self {
        Self {
            fail_on_start: true,
            ..Default::default()
        }
    }

    pub fn closed_with(&self) -> Option<(bool, BTreeMap<StreamId, StreamSyncSummary>)> {
        self.closed_with.lock().clone()
    }
}

#[async_trait]
impl LifecycleHooks for RecordingHooks {
    async fn on_start(&self) -> Result<(), BoxError> {
        if self.fail_on_start {
            return Err(Box::new(TestError::DestinationUnavailable));
        }
        Ok(())
    }

    async fn on_close(
        &self,
        has_failed: bool,
        summaries: &BTreeMap<StreamId, StreamSyncSummary>,
    ) -> Result<(), BoxError> {
        *self.closed_with.lock() = Some((has_failed, summaries.clone()));
        Ok(())
    }
}

pub fn test_options() -> BufferOptions {
    BufferOptions::default().with_poll_interval(Duration::from_millis(5))
}

pub fn create_gateway(
    destination: Arc<dyn DestinationFlush>,
    options: BufferOptions,
) -> (IngestionGateway, Arc<CollectingEmitter>) {
    let emitter = Arc::new(CollectingEmitter::default());
    let gateway = IngestionGateway::new(destination, emitter.clone(), options);
    (gateway, emitter)
}

pub fn record_line(stream: &StreamId, id: usize) -> String {
    sluice_protocol::wire::record_line(stream, &serde_json::json!({ "id": id }), Some(1))
}

pub fn state_line(id: usize) -> String {
    sluice_protocol::wire::global_state_line(&serde_json::json!({ "cursor": id }))
}

pub fn payload(id: usize) -> String {
    format!(r#"{{"id":{id}}}"#)
}
