//! Bookkeeping for flushes currently in progress.
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use sluice_protocol::StreamId;

/// Flush tasks currently running, grouped by stream.
///
/// Each entry records how many bytes the task claimed from the buffer, or
/// `None` while the task is still assembling its batch.
#[derive(Debug, Default)]
pub struct RunningFlushes {
    next_id: AtomicU64,
    streams: Mutex<HashMap<StreamId, HashMap<u64, Option<u64>>>>,
}

/// A registered flush task.
///
/// The task is removed from the registry when this handle is dropped.
#[derive(Debug)]
pub struct RunningFlush {
    registry: Arc<RunningFlushes>,
    stream: StreamId,
    id: u64,
}

impl RunningFlushes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new flush task for `stream` with an unknown size.
    pub fn register(self: &Arc<Self>, stream: StreamId) -> RunningFlush {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.streams
            .lock()
            .entry(stream.clone())
            .or_default()
            .insert(id, None);

        RunningFlush {
            registry: self.clone(),
            stream,
            id,
        }
    }

    /// Sizes of the tasks running for `stream`.
    pub fn sizes(&self, stream: &StreamId) -> Vec<Option<u64>> {
        self.streams
            .lock()
            .get(stream)
            .map(|tasks| tasks.values().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of running tasks.
    pub fn len(&self) -> usize {
        self.streams.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_size(&self, stream: &StreamId, id: u64, size_bytes: u64) {
        if let Some(size) = self
            .streams
            .lock()
            .get_mut(stream)
            .and_then(|tasks| tasks.get_mut(&id))
        {
            *size = Some(size_bytes);
        }
    }

    fn deregister(&self, stream: &StreamId, id: u64) {
        let mut streams = self.streams.lock();
        if let Some(tasks) = streams.get_mut(stream) {
            tasks.remove(&id);
            if tasks.is_empty() {
                streams.remove(stream);
            }
        }
    }
}

impl RunningFlush {
    /// Records the number of bytes the task claimed.
    pub fn set_size(&self, size_bytes: u64) {
        self.registry.set_size(&self.stream, self.id, size_bytes);
    }
}

impl Drop for RunningFlush {
    fn drop(&mut self) {
        self.registry.deregister(&self.stream, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let registry = Arc::new(RunningFlushes::new());
        let stream = StreamId::unqualified("users");

        let first = registry.register(stream.clone());
        let second = registry.register(stream.clone());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.sizes(&stream), vec![None, None]);

        first.set_size(42);
        let mut sizes = registry.sizes(&stream);
        sizes.sort();
        assert_eq!(sizes, vec![None, Some(42)]);

        drop(first);
        assert_eq!(registry.sizes(&stream), vec![None]);

        drop(second);
        assert!(registry.is_empty());
        assert!(registry.sizes(&stream).is_empty());
    }
}
