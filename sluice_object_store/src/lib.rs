//! Reference destination that writes flushed batches to an object store.
//!
//! Each batch becomes one JSON-lines object, see [`paths`] for the layout.
pub mod destination;
pub mod error;
pub mod local;
pub mod paths;

pub use destination::{BatchIdGenerator, ObjectStoreDestination, UlidBatchIdGenerator};
pub use error::{ObjectStoreDestinationError, Result};
pub use local::{TemporaryFileSystem, local_object_store};
