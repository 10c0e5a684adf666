//! Object layout.
//!
//! ```text
//! <namespace>/<stream>/<batch id>.jsonl
//! _manifest.json
//! ```
//!
//! Streams without a namespace are stored under `_`. Namespaces starting with
//! `_` get an extra leading `_`, so no namespace maps onto `_` or onto the
//! manifest.
use std::borrow::Cow;

use object_store::path::Path;
use sluice_protocol::StreamId;

pub const NO_NAMESPACE: &str = "_";
pub const MANIFEST_FILE: &str = "_manifest.json";

fn namespace_segment(stream: &StreamId) -> Cow<'_, str> {
    match stream.namespace.as_deref() {
        None => Cow::Borrowed(NO_NAMESPACE),
        Some(namespace) if namespace.starts_with('_') => Cow::Owned(format!("_{namespace}")),
        Some(namespace) => Cow::Borrowed(namespace),
    }
}

pub fn format_batch_path(stream: &StreamId, batch_id: &str) -> Path {
    let namespace = namespace_segment(stream);
    let file_name = format!("{batch_id}.jsonl");
    Path::from_iter([namespace.as_ref(), stream.name.as_str(), file_name.as_str()])
}

pub fn format_stream_prefix(stream: &StreamId) -> Path {
    let namespace = namespace_segment(stream);
    Path::from_iter([namespace.as_ref(), stream.name.as_str()])
}

pub fn manifest_path() -> Path {
    Path::from(MANIFEST_FILE)
}
