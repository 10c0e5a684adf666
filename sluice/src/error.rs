use sluice_buffer_core::IngestError;
use sluice_object_store::ObjectStoreDestinationError;
use sluice_observability::ObservabilityError;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Failed to open output directory"))]
    Output { source: ObjectStoreDestinationError },
    #[snafu(display("Failed to {operation}"))]
    Io {
        operation: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("Ingestion failed"))]
    Ingest { source: IngestError },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
