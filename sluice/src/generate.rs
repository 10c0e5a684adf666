use std::io::{BufWriter, Write};

use clap::Args;
use serde_json::json;
use sluice_protocol::{StreamId, wire};
use snafu::ResultExt;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{IoSnafu, Result};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Number of streams.
    #[arg(long, default_value_t = 3)]
    streams: usize,
    /// Number of records per stream.
    #[arg(long, default_value_t = 1000)]
    records: usize,
    /// Emit a state message after this many records. Zero disables states.
    #[arg(long, default_value_t = 100)]
    state_every: usize,
    /// Namespace of the generated streams.
    #[arg(long)]
    namespace: Option<String>,
}

impl GenerateArgs {
    pub fn run(self, ct: CancellationToken) -> Result<()> {
        let stdout = std::io::stdout().lock();
        let mut writer = BufWriter::new(stdout);

        let mut written = 0;
        for line in self.lines() {
            if ct.is_cancelled() {
                break;
            }

            writeln!(writer, "{line}").context(IoSnafu { operation: "write stdout" })?;
            written += 1;
        }

        writer.flush().context(IoSnafu { operation: "write stdout" })?;
        info!(lines = written, "generated messages");

        Ok(())
    }

    /// Round-robin records across streams, with a per-stream state message
    /// every `state_every` records.
    fn lines(&self) -> impl Iterator<Item = String> + '_ {
        let streams = (0..self.streams)
            .map(|i| StreamId::new(self.namespace.clone(), format!("stream_{i}")))
            .collect::<Vec<_>>();
        let emitted_at = OffsetDateTime::now_utc().unix_timestamp() * 1000;

        (0..self.records * streams.len()).flat_map(move |n| {
            let stream = &streams[n % streams.len()];
            let id = n / streams.len();
            let data = json!({
                "id": id,
                "name": format!("{}-{id}", stream.name),
                "amount": (id as f64) * 1.5,
            });

            let mut lines = vec![wire::record_line(stream, &data, Some(emitted_at))];
            if self.state_every > 0 && (n + 1) % self.state_every == 0 {
                lines.push(wire::stream_state_line(stream, &json!({ "cursor": id })));
            }
            lines
        })
    }
}
