#![allow(dead_code)]

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::{ObjectStore, memory::InMemory, path::Path};
pub use sluice_buffer_core::test_utils::CollectingEmitter;

pub fn in_memory_store() -> Arc<dyn ObjectStore> {
    Arc::new(InMemory::new())
}

/// Returns every object under `prefix`, sorted by location.
pub async fn list_objects(store: &Arc<dyn ObjectStore>, prefix: Option<&Path>) -> Vec<Path> {
    let mut locations = store
        .list(prefix)
        .map_ok(|meta| meta.location)
        .try_collect::<Vec<_>>()
        .await
        .expect("list objects");
    locations.sort();
    locations
}

pub async fn read_lines(store: &Arc<dyn ObjectStore>, location: &Path) -> Vec<String> {
    let bytes = store
        .get(location)
        .await
        .expect("get object")
        .bytes()
        .await
        .expect("read object");
    String::from_utf8(bytes.to_vec())
        .expect("utf8 content")
        .lines()
        .map(str::to_string)
        .collect()
}
