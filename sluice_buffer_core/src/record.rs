use std::{collections::BTreeMap, fmt::Debug};

use tokio::time::Instant;

/// A record waiting in the buffer.
#[derive(Clone)]
pub struct BufferedRecord {
    /// The serialized record payload.
    pub serialized: String,
    /// The size used for memory accounting.
    pub size_bytes: u64,
    /// When the record entered the buffer.
    pub received_at: Instant,
    pub(crate) epoch: u64,
}

/// A batch of records claimed for flushing.
///
/// The batch can be iterated only once. Records are released as they are
/// consumed, so a destination that streams them out never holds the whole
/// batch twice.
pub struct FlushBatch {
    records: std::vec::IntoIter<BufferedRecord>,
    size_bytes: u64,
    record_count: usize,
    epochs: BTreeMap<u64, u64>,
}

impl BufferedRecord {
    pub fn new(serialized: impl Into<String>, size_bytes: u64) -> Self {
        Self::with_epoch(serialized, size_bytes, 0)
    }

    pub(crate) fn with_epoch(serialized: impl Into<String>, size_bytes: u64, epoch: u64) -> Self {
        Self {
            serialized: serialized.into(),
            size_bytes,
            received_at: Instant::now(),
            epoch,
        }
    }
}

impl FlushBatch {
    pub fn new(records: Vec<BufferedRecord>) -> Self {
        let mut size_bytes = 0;
        let mut epochs = BTreeMap::new();
        for record in records.iter() {
            size_bytes += record.size_bytes;
            *epochs.entry(record.epoch).or_insert(0) += 1;
        }

        Self {
            record_count: records.len(),
            records: records.into_iter(),
            size_bytes,
            epochs,
        }
    }

    /// Total size of the claimed records, in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Number of records claimed, including those already consumed.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Number of records per checkpoint epoch.
    pub(crate) fn epochs(&self) -> &BTreeMap<u64, u64> {
        &self.epochs
    }
}

impl Iterator for FlushBatch {
    type Item = BufferedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for FlushBatch {}

impl Debug for BufferedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedRecord")
            .field("size_bytes", &self.size_bytes)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl Debug for FlushBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = bytesize::ByteSize(self.size_bytes);
        f.debug_struct("FlushBatch")
            .field("size", &format!("<{}>", size))
            .field("records", &format!("<{} entries>", self.record_count))
            .finish()
    }
}
