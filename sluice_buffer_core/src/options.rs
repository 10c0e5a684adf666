use std::time::Duration;

use bytesize::ByteSize;

/// Shortest interval the scheduler polls at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Options for the buffering write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferOptions {
    /// Maximum number of bytes held in memory across all streams.
    pub max_buffer_size: ByteSize,
    /// How often the scheduler looks for streams to flush.
    pub poll_interval: Duration,
    /// Streams whose most recent record is older than this are flushed regardless of size.
    pub staleness_window: Duration,
    /// Number of flushes that can run concurrently.
    pub worker_count: usize,
    /// Namespace assigned to records that don't specify one.
    pub default_namespace: Option<String>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: ByteSize::mib(256),
            poll_interval: Duration::from_millis(100),
            staleness_window: Duration::from_secs(5 * 60),
            worker_count: 5,
            default_namespace: None,
        }
    }
}

impl BufferOptions {
    /// Change the maximum buffer size.
    pub fn with_max_buffer_size(mut self, max_buffer_size: ByteSize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    /// Change the scheduler poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Change the staleness window used by the time trigger.
    pub fn with_staleness_window(mut self, staleness_window: Duration) -> Self {
        self.staleness_window = staleness_window;
        self
    }

    /// Change the number of concurrent flush workers.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Change the default namespace.
    pub fn with_default_namespace(mut self, default_namespace: Option<String>) -> Self {
        self.default_namespace = default_namespace;
        self
    }

    /// Poll interval used by the scheduler, never shorter than [`MIN_POLL_INTERVAL`].
    pub(crate) fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Worker count used by the scheduler, at least one.
    pub(crate) fn effective_worker_count(&self) -> usize {
        self.worker_count.max(1)
    }
}
