//! Helpers shared by unit tests and downstream integration tests.
use parking_lot::Mutex;

use crate::{checkpoint::ReleasedCheckpoint, destination::CheckpointEmitter};

/// Emitter that keeps every released checkpoint.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    released: Mutex<Vec<ReleasedCheckpoint>>,
}

impl CollectingEmitter {
    pub fn released(&self) -> Vec<ReleasedCheckpoint> {
        self.released.lock().clone()
    }

    /// Serialized checkpoint messages, in release order.
    pub fn released_payloads(&self) -> Vec<String> {
        self.released
            .lock()
            .iter()
            .map(|checkpoint| checkpoint.message.serialized.clone())
            .collect()
    }
}

impl CheckpointEmitter for CollectingEmitter {
    fn emit(&self, checkpoint: ReleasedCheckpoint) {
        self.released.lock().push(checkpoint);
    }
}
