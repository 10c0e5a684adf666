use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bytes::BytesMut;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use serde::Serialize;
use sluice_buffer_core::{
    BoxError, DestinationFlush, FlushBatch, LifecycleHooks, StreamSyncSummary,
};
use sluice_protocol::StreamId;
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    error::{ManifestSnafu, Result, UploadSnafu},
    paths::{format_batch_path, manifest_path},
};

/// Default optimal batch size, in bytes.
pub const DEFAULT_OPTIMAL_BATCH_SIZE: u64 = 25 * 1024 * 1024;

/// Generates unique ids for batch files.
pub trait BatchIdGenerator: Send + Sync + 'static {
    fn generate_id(&self) -> String;
}

/// Generates ids with the ULID algorithm, so files sort by creation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidBatchIdGenerator;

/// Writes each batch as a JSON-lines object and a manifest on close.
#[derive(Clone)]
pub struct ObjectStoreDestination {
    store: Arc<dyn ObjectStore>,
    id_generator: Arc<dyn BatchIdGenerator>,
    optimal_batch_size: u64,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    streams: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    stream: &'a StreamId,
    records_accepted: u64,
}

impl ObjectStoreDestination {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            id_generator: Arc::new(UlidBatchIdGenerator),
            optimal_batch_size: DEFAULT_OPTIMAL_BATCH_SIZE,
        }
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn BatchIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_optimal_batch_size(mut self, optimal_batch_size: u64) -> Self {
        self.optimal_batch_size = optimal_batch_size;
        self
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    async fn write_batch(&self, stream: &StreamId, batch: FlushBatch) -> Result<()> {
        let record_count = batch.record_count();
        // One newline per record.
        let capacity = batch.size_bytes() as usize + record_count;

        let mut content = BytesMut::with_capacity(capacity);
        for record in batch {
            content.extend_from_slice(record.serialized.as_bytes());
            content.extend_from_slice(b"\n");
        }

        let location = format_batch_path(stream, &self.id_generator.generate_id());
        self.put_create(&location, PutPayload::from_bytes(content.freeze()))
            .await?;

        debug!(stream = %stream, location = %location, record_count, "batch written");

        Ok(())
    }

    async fn write_manifest(&self, summaries: &BTreeMap<StreamId, StreamSyncSummary>) -> Result<()> {
        let manifest = Manifest {
            streams: summaries
                .iter()
                .map(|(stream, summary)| ManifestEntry {
                    stream,
                    records_accepted: summary.records_accepted,
                })
                .collect(),
        };

        let content = serde_json::to_vec_pretty(&manifest).context(ManifestSnafu)?;
        let location = manifest_path();
        self.store
            .put(&location, PutPayload::from(content))
            .await
            .context(UploadSnafu {
                location: location.to_string(),
            })?;

        info!(location = %location, streams = summaries.len(), "manifest written");

        Ok(())
    }

    async fn put_create(&self, location: &object_store::path::Path, payload: PutPayload) -> Result<()> {
        self.store
            .put_opts(
                location,
                payload,
                PutOptions {
                    mode: PutMode::Create,
                    ..Default::default()
                },
            )
            .await
            .context(UploadSnafu {
                location: location.to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl DestinationFlush for ObjectStoreDestination {
    async fn flush(&self, stream: &StreamId, batch: FlushBatch) -> Result<(), BoxError> {
        self.write_batch(stream, batch).await?;
        Ok(())
    }

    fn optimal_batch_size_bytes(&self) -> u64 {
        self.optimal_batch_size
    }
}

#[async_trait]
impl LifecycleHooks for ObjectStoreDestination {
    async fn on_close(
        &self,
        has_failed: bool,
        summaries: &BTreeMap<StreamId, StreamSyncSummary>,
    ) -> Result<(), BoxError> {
        if has_failed {
            info!("sync failed, skipping manifest");
            return Ok(());
        }

        self.write_manifest(summaries).await?;
        Ok(())
    }
}

impl BatchIdGenerator for UlidBatchIdGenerator {
    fn generate_id(&self) -> String {
        ulid::Ulid::new().to_string()
    }
}
