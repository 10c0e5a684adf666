use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ObjectStoreDestinationError {
    #[snafu(display("failed to prepare directory {}", path.display()))]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to create object store: {message}"))]
    Creation {
        message: &'static str,
        source: object_store::Error,
    },
    #[snafu(display("failed to write {location}"))]
    Upload {
        location: String,
        source: object_store::Error,
    },
    #[snafu(display("failed to serialize manifest"))]
    Manifest { source: serde_json::Error },
}

pub type Result<T, E = ObjectStoreDestinationError> = std::result::Result<T, E>;
