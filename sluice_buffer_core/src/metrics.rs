use sluice_observability::{Counter, UpDownCounter};

#[derive(Clone)]
pub struct BufferMetrics {
    pub accepted_records: Counter<u64>,
    pub accepted_bytes: Counter<u64>,
    pub buffered_bytes: UpDownCounter<i64>,
    pub flushed_records: Counter<u64>,
    pub flushed_bytes: Counter<u64>,
    pub failed_flushes: Counter<u64>,
    pub released_checkpoints: Counter<u64>,
}

impl Default for BufferMetrics {
    fn default() -> Self {
        let meter = sluice_observability::meter("buffer");
        Self {
            accepted_records: meter
                .u64_counter("buffer.accepted.records")
                .with_unit("{record}")
                .with_description("number of records accepted into the buffer")
                .build(),
            accepted_bytes: meter
                .u64_counter("buffer.accepted.bytes")
                .with_unit("By")
                .with_description("bytes accepted into the buffer")
                .build(),
            buffered_bytes: meter
                .i64_up_down_counter("buffer.size")
                .with_unit("By")
                .with_description("bytes currently held in the buffer")
                .build(),
            flushed_records: meter
                .u64_counter("buffer.flushed.records")
                .with_unit("{record}")
                .with_description("number of records flushed to the destination")
                .build(),
            flushed_bytes: meter
                .u64_counter("buffer.flushed.bytes")
                .with_unit("By")
                .with_description("bytes flushed to the destination")
                .build(),
            failed_flushes: meter
                .u64_counter("buffer.flush.failures")
                .with_unit("{flush}")
                .with_description("number of flushes that failed")
                .build(),
            released_checkpoints: meter
                .u64_counter("buffer.checkpoints.released")
                .with_unit("{checkpoint}")
                .with_description("number of checkpoints released downstream")
                .build(),
        }
    }
}
