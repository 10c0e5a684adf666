//! Writes released checkpoints to stdout.
use std::{collections::BTreeMap, io::Write};

use serde_json::value::{RawValue, to_raw_value};
use sluice_buffer_core::{CheckpointEmitter, ReleasedCheckpoint};
use tracing::{error, warn};

#[derive(Debug, Default)]
pub struct StdoutEmitter;

impl CheckpointEmitter for StdoutEmitter {
    fn emit(&self, checkpoint: ReleasedCheckpoint) {
        let line = match with_record_count(&checkpoint.message.serialized, checkpoint.record_count)
        {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to add record count to checkpoint");
                checkpoint.message.serialized
            }
        };

        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
            error!(error = %err, "failed to write checkpoint");
        }
    }
}

/// Adds `state.destinationStats.recordCount` to a serialized state message.
///
/// Other values are copied verbatim.
pub fn with_record_count(serialized: &str, record_count: u64) -> Result<String, serde_json::Error> {
    let mut message: BTreeMap<String, Box<RawValue>> = serde_json::from_str(serialized)?;

    let mut state: BTreeMap<String, Box<RawValue>> = match message.get("state") {
        Some(state) => serde_json::from_str(state.get())?,
        None => BTreeMap::new(),
    };

    let stats = serde_json::json!({ "recordCount": record_count as f64 });
    state.insert("destinationStats".to_string(), to_raw_value(&stats)?);
    message.insert("state".to_string(), to_raw_value(&state)?);

    serde_json::to_string(&message)
}
