//! Local file system stores.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use object_store::{ObjectStore, local::LocalFileSystem};
use snafu::ResultExt;
use tempfile::TempDir;

use crate::error::{CreationSnafu, DirectorySnafu, Result};

/// Creates a store rooted at `root`, creating the directory if needed.
pub fn local_object_store(root: impl AsRef<Path>) -> Result<Arc<dyn ObjectStore>> {
    let root = root.as_ref();
    std::fs::create_dir_all(root).context(DirectorySnafu { path: root })?;
    let root = std::fs::canonicalize(root).context(DirectorySnafu { path: root })?;

    let store = LocalFileSystem::new_with_prefix(&root).context(CreationSnafu {
        message: "local file system",
    })?;

    Ok(Arc::new(store))
}

/// A local store in a temporary directory, removed on drop.
pub struct TemporaryFileSystem {
    temp_dir: TempDir,
    store: Arc<dyn ObjectStore>,
}

impl TemporaryFileSystem {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context(DirectorySnafu {
            path: std::env::temp_dir(),
        })?;
        let store = local_object_store(temp_dir.path())?;
        Ok(Self { temp_dir, store })
    }

    pub fn root_path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Keeps the directory on disk and returns its path.
    pub fn persist(self) -> PathBuf {
        self.temp_dir.keep()
    }
}
