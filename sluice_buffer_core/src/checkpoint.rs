//! Checkpoint coalescing and release.
//!
//! Every buffered record is tagged with the epoch that was current when it
//! arrived. A checkpoint closes the current epoch: it may be released once no
//! record of that epoch, or of any earlier one, is still waiting to be flushed.
//!
//! Only one checkpoint is pending at a time. A newer checkpoint replaces the
//! pending one, which is then never emitted.
use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use sluice_protocol::CheckpointMessage;
use tracing::{debug, info};

use crate::{destination::CheckpointEmitter, metrics::BufferMetrics};

/// A checkpoint handed to the downstream emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedCheckpoint {
    /// The checkpoint message, as received.
    pub message: CheckpointMessage,
    /// Records covered by this checkpoint since the previous release.
    pub record_count: u64,
}

pub struct CheckpointTracker {
    state: Mutex<TrackerState>,
    emitter: Arc<dyn CheckpointEmitter>,
    metrics: BufferMetrics,
}

#[derive(Debug, Default)]
struct TrackerState {
    current_epoch: u64,
    current_epoch_records: u64,
    /// Records not yet flushed, by epoch. Epochs with no records are removed.
    outstanding: BTreeMap<u64, u64>,
    pending: Option<PendingCheckpoint>,
}

#[derive(Debug)]
struct PendingCheckpoint {
    message: CheckpointMessage,
    epoch: u64,
    record_count: u64,
}

impl CheckpointTracker {
    pub fn new(emitter: Arc<dyn CheckpointEmitter>) -> Self {
        Self::new_with_metrics(emitter, BufferMetrics::default())
    }

    pub fn new_with_metrics(emitter: Arc<dyn CheckpointEmitter>, metrics: BufferMetrics) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            emitter,
            metrics,
        }
    }

    /// Accounts for a record about to be buffered and returns its epoch.
    pub fn record_enqueued(&self) -> u64 {
        let mut state = self.state.lock();
        let epoch = state.current_epoch;
        *state.outstanding.entry(epoch).or_insert(0) += 1;
        state.current_epoch_records += 1;
        epoch
    }

    /// Makes `message` the pending checkpoint, replacing any previous one.
    pub fn checkpoint_received(&self, message: CheckpointMessage) {
        let mut state = self.state.lock();
        let epoch = state.current_epoch;
        let mut record_count = state.current_epoch_records;

        if let Some(replaced) = state.pending.take() {
            debug!(
                epoch = replaced.epoch,
                "coalescing pending checkpoint into a newer one"
            );
            record_count += replaced.record_count;
        }

        state.pending = Some(PendingCheckpoint {
            message,
            epoch,
            record_count,
        });
        state.current_epoch += 1;
        state.current_epoch_records = 0;
    }

    /// Acknowledges flushed records, given as record counts per epoch.
    ///
    /// Releases the pending checkpoint if it became durable.
    pub fn records_flushed(&self, epochs: &BTreeMap<u64, u64>) -> bool {
        let mut state = self.state.lock();

        for (epoch, count) in epochs.iter() {
            if let Some(outstanding) = state.outstanding.get_mut(epoch) {
                *outstanding = outstanding.saturating_sub(*count);
                if *outstanding == 0 {
                    state.outstanding.remove(epoch);
                }
            }
        }

        self.release_if_durable(&mut state)
    }

    /// Releases the pending checkpoint if every record before it was flushed.
    pub fn release_pending(&self) -> bool {
        let mut state = self.state.lock();
        self.release_if_durable(&mut state)
    }

    /// Whether a checkpoint is waiting to be released.
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    fn release_if_durable(&self, state: &mut TrackerState) -> bool {
        let Some(pending) = state.pending.as_ref() else {
            return false;
        };

        let durable = state
            .outstanding
            .keys()
            .next()
            .is_none_or(|first_outstanding| *first_outstanding > pending.epoch);

        if !durable {
            return false;
        }

        let Some(pending) = state.pending.take() else {
            return false;
        };

        info!(
            epoch = pending.epoch,
            record_count = pending.record_count,
            "releasing checkpoint"
        );

        // Emitting while holding the lock keeps releases ordered.
        self.emitter.emit(ReleasedCheckpoint {
            message: pending.message,
            record_count: pending.record_count,
        });
        self.metrics.released_checkpoints.add(1, &[]);

        true
    }
}
