use std::collections::VecDeque;

use tokio::time::Instant;

use crate::record::BufferedRecord;

/// FIFO queue of records for a single stream.
#[derive(Debug, Default)]
pub(crate) struct StreamBuffer {
    records: VecDeque<BufferedRecord>,
    size_bytes: u64,
    last_record_at: Option<Instant>,
}

impl StreamBuffer {
    pub fn push(&mut self, record: BufferedRecord) {
        self.size_bytes += record.size_bytes;
        self.last_record_at = Some(record.received_at);
        self.records.push_back(record);
    }

    /// Removes records from the head of the queue until `max_bytes` would be exceeded.
    ///
    /// The head record is always claimed when `max_bytes` is not zero, so that
    /// records larger than the batch size are not stuck forever.
    pub fn claim(&mut self, max_bytes: u64) -> Vec<BufferedRecord> {
        let mut claimed = Vec::new();
        let mut claimed_bytes = 0u64;

        if max_bytes == 0 {
            return claimed;
        }

        while let Some(head) = self.records.front() {
            let next_size = claimed_bytes + head.size_bytes;
            if !claimed.is_empty() && next_size > max_bytes {
                break;
            }

            let Some(record) = self.records.pop_front() else {
                break;
            };

            claimed_bytes = next_size;
            claimed.push(record);

            if claimed_bytes >= max_bytes {
                break;
            }
        }

        self.size_bytes -= claimed_bytes;

        if self.records.is_empty() {
            self.last_record_at = None;
        }

        claimed
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Arrival time of the most recent record still in the queue.
    pub fn last_record_at(&self) -> Option<Instant> {
        self.last_record_at
    }
}
