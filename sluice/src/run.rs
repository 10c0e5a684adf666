use std::{path::PathBuf, sync::Arc, time::Duration};

use bytesize::ByteSize;
use clap::Args;
use sluice_buffer_core::{BufferOptions, IngestionGateway};
use sluice_object_store::{ObjectStoreDestination, TemporaryFileSystem, local_object_store};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    emitter::StdoutEmitter,
    error::{IngestSnafu, IoSnafu, OutputSnafu, Result},
};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory where records are written. Defaults to a temporary directory.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Keep the temporary directory when no output directory is given.
    #[arg(long, default_value_t = false)]
    keep: bool,
    /// Maximum amount of memory used to buffer records.
    #[arg(long, default_value = "256MiB")]
    max_buffer_size: ByteSize,
    /// Preferred size of the files written to the output.
    #[arg(long, default_value = "25MiB")]
    batch_size: ByteSize,
    /// How often to look for streams to flush, in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,
    /// Flush streams that received no records for this many seconds.
    #[arg(long, default_value_t = 300)]
    staleness_window_secs: u64,
    /// Number of concurrent flushes.
    #[arg(long, default_value_t = 5)]
    workers: usize,
    /// Namespace assigned to records without one.
    #[arg(long)]
    default_namespace: Option<String>,
    /// Fail on messages that can't be parsed instead of skipping them.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

impl RunArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let options = self.buffer_options();

        let (store, output_path, temporary) = match &self.output {
            Some(path) => (
                local_object_store(path).context(OutputSnafu)?,
                path.clone(),
                None,
            ),
            None => {
                let temporary = TemporaryFileSystem::new().context(OutputSnafu)?;
                (temporary.store(), temporary.root_path(), Some(temporary))
            }
        };
        info!(path = %output_path.display(), "writing records");

        let destination = Arc::new(
            ObjectStoreDestination::new(store).with_optimal_batch_size(self.batch_size.as_u64()),
        );
        let mut gateway = IngestionGateway::with_hooks(
            destination.clone(),
            Arc::new(StdoutEmitter),
            destination,
            options,
        );

        gateway.start().await.context(IngestSnafu)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut skipped = 0u64;

        loop {
            let line = tokio::select! {
                _ = ct.cancelled() => {
                    info!("interrupted, closing");
                    break;
                }
                line = lines.next_line() => line.context(IoSnafu { operation: "read stdin" })?,
            };

            let Some(line) = line else {
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            match gateway.accept(&line, line.len() as u64).await {
                Ok(()) => {}
                Err(err) if err.is_parse() && !self.strict => {
                    warn!(error = ?err, "skipping message");
                    skipped += 1;
                }
                Err(err) => {
                    // Wait for running flushes before reporting the error.
                    if let Err(close_err) = gateway.close().await {
                        warn!(error = %close_err, "failed to close after error");
                    }
                    return Err(err).context(IngestSnafu);
                }
            }
        }

        gateway.close().await.context(IngestSnafu)?;

        if skipped > 0 {
            warn!(skipped, "some messages were skipped");
        }

        if let Some(temporary) = temporary {
            if self.keep {
                let path = temporary.persist();
                info!(path = %path.display(), "kept output directory");
            }
        }

        Ok(())
    }

    fn buffer_options(&self) -> BufferOptions {
        BufferOptions::default()
            .with_max_buffer_size(self.max_buffer_size)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_staleness_window(Duration::from_secs(self.staleness_window_secs))
            .with_worker_count(self.workers)
            .with_default_namespace(self.default_namespace.clone())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_default_options() {
        let cli = TestCli::parse_from(["sluice"]);
        assert_eq!(cli.args.buffer_options(), BufferOptions::default());
        assert_eq!(cli.args.batch_size, ByteSize::mib(25));
    }

    #[test]
    fn test_options_from_arguments() {
        let cli = TestCli::parse_from([
            "sluice",
            "--max-buffer-size",
            "10KiB",
            "--workers",
            "0",
            "--default-namespace",
            "public",
        ]);
        let options = cli.args.buffer_options();
        assert_eq!(options.max_buffer_size, ByteSize::kib(10));
        assert_eq!(options.worker_count, 1);
        assert_eq!(options.default_namespace.as_deref(), Some("public"));
    }
}
