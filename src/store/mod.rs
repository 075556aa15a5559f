//! Object storage for the release ledger and artifact archives.
//!
//! Two backends implement [`ObjectStore`]: [`AwsCliStore`] talks to S3 through
//! the `aws` command line client, [`FsObjectStore`] maps buckets onto local
//! directories (offline mirrors and tests).

mod fs;
mod s3;

pub use fs::FsObjectStore;
pub use s3::AwsCliStore;

use crate::error::StoreError;
use std::fmt;
use std::path::Path;

/// Default bucket holding firmware builds
pub const DEFAULT_BUCKET: &str = "builds.tessel.io";

/// Default key prefix inside the bucket
pub const DEFAULT_PREFIX: &str = "t2/firmware";

/// File name of the release ledger under the prefix
pub const LEDGER_FILE_NAME: &str = "builds.json";

/// Address of one object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Bucket name
    pub bucket: String,
    /// Key inside the bucket
    pub key: String,
}

impl ObjectKey {
    /// Create an object address
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub(crate) fn not_found(&self) -> StoreError {
        StoreError::NotFound {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
        }
    }

    pub(crate) fn transport(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Transport {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn upload_failed(&self, reason: impl Into<String>) -> StoreError {
        StoreError::UploadFailed {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Where releases live: the ledger at `<prefix>/builds.json`, archives at
/// `<prefix>/<source revision>.tar.gz`, all in one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    bucket: String,
    prefix: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET, DEFAULT_PREFIX)
    }
}

impl StoreLayout {
    /// Create a layout; surrounding slashes on `prefix` are ignored
    pub fn new(bucket: impl Into<String>, prefix: impl AsRef<str>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    fn key_for(&self, name: &str) -> ObjectKey {
        let key = if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        };
        ObjectKey::new(self.bucket.clone(), key)
    }

    /// Address of the release ledger
    pub fn ledger_key(&self) -> ObjectKey {
        self.key_for(LEDGER_FILE_NAME)
    }

    /// Address of the artifact archive for `source_revision`
    pub fn archive_key(&self, source_revision: &str) -> ObjectKey {
        self.key_for(&archive_file_name(source_revision))
    }
}

/// Archive file name for a source revision
pub fn archive_file_name(source_revision: &str) -> String {
    format!("{source_revision}.tar.gz")
}

/// Fetch and store named blobs.
///
/// Calls either complete or fail; nothing is retried.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Read an object. A missing object is [`StoreError::NotFound`].
    async fn fetch(&self, object: &ObjectKey) -> Result<Vec<u8>, StoreError>;

    /// Upload the file at `local_path` to `object`, replacing it.
    async fn store(&self, object: &ObjectKey, local_path: &Path) -> Result<(), StoreError>;
}

/// Backend chosen at startup
#[derive(Debug, Clone)]
pub enum Store {
    /// S3 through the `aws` CLI
    S3(AwsCliStore),
    /// Buckets as directories
    Fs(FsObjectStore),
}

impl ObjectStore for Store {
    async fn fetch(&self, object: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        match self {
            Store::S3(s) => s.fetch(object).await,
            Store::Fs(s) => s.fetch(object).await,
        }
    }

    async fn store(&self, object: &ObjectKey, local_path: &Path) -> Result<(), StoreError> {
        match self {
            Store::S3(s) => s.store(object, local_path).await,
            Store::Fs(s) => s.store(object, local_path).await,
        }
    }
}
