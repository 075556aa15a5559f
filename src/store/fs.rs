//! Directory-backed object store: `<root>/<bucket>/<key>`.

use super::{ObjectKey, ObjectStore};
use crate::error::StoreError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Object store whose buckets are directories under `root`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object to a file path, refusing keys that escape the bucket
    pub fn path_for(&self, object: &ObjectKey) -> Result<PathBuf, StoreError> {
        let key = Path::new(&object.key);
        let escapes = key
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || object.bucket.contains(['/', '\\']) || object.bucket.starts_with('.') {
            return Err(object.transport("key escapes the bucket directory"));
        }
        Ok(self.root.join(&object.bucket).join(key))
    }
}

impl ObjectStore for FsObjectStore {
    async fn fetch(&self, object: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(object)?;
        log::debug!("Reading {} from {}", object, path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(object.not_found()),
            Err(e) => Err(object.transport(e.to_string())),
        }
    }

    async fn store(&self, object: &ObjectKey, local_path: &Path) -> Result<(), StoreError> {
        let path = self.path_for(object)?;
        log::debug!("Copying {} to {}", local_path.display(), path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| object.transport(format!("Failed to create directory: {e}")))?;
        }

        // Copy beside the target, then rename so readers never see a partial object
        let partial = path.with_extension("partial");
        tokio::fs::copy(local_path, &partial)
            .await
            .map_err(|e| object.upload_failed(format!("Failed to copy {}: {e}", local_path.display())))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| object.upload_failed(format!("Failed to rename into place: {e}")))?;

        Ok(())
    }
}
