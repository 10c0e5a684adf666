use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a logical stream of records.
///
/// The namespace is optional, records without one are usually assigned the
/// destination's default namespace before being buffered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl StreamId {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Creates a stream identifier without namespace.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self::new(None, name)
    }

    /// Creates a stream identifier inside `namespace`.
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Some(namespace.into()), name)
    }

    /// Returns a copy of this identifier with `namespace` filled in if it was missing.
    pub fn with_default_namespace(self, namespace: Option<&str>) -> Self {
        match (self.namespace, namespace) {
            (None, Some(default)) => Self::new(Some(default.to_string()), self.name),
            (namespace, _) => Self::new(namespace, self.name),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}.{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
