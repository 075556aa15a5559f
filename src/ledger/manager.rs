//! Loading and publishing the release ledger.
//!
//! The manager assumes a single writer: publishing overwrites the stored
//! ledger without comparing it to the snapshot that was loaded. Two release
//! runs racing on the same bucket can lose a record.

use super::Ledger;
use crate::error::{LedgerError, Result, StoreError};
use crate::store::{LEDGER_FILE_NAME, ObjectKey, ObjectStore};
use std::path::{Path, PathBuf};

/// Reads and writes the ledger blob through an [`ObjectStore`]
#[derive(Debug)]
pub struct LedgerManager<'a, S: ObjectStore> {
    store: &'a S,
    location: ObjectKey,
    staging_dir: PathBuf,
    allow_missing: bool,
}

impl<'a, S: ObjectStore> LedgerManager<'a, S> {
    /// Create a manager for the ledger at `location`.
    ///
    /// Published ledgers are written to `staging_dir/builds.json` before
    /// upload.
    pub fn new(store: &'a S, location: ObjectKey, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            location,
            staging_dir: staging_dir.into(),
            allow_missing: false,
        }
    }

    /// Treat a missing ledger blob as "no prior releases"
    pub fn allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    /// Address of the ledger
    pub fn location(&self) -> &ObjectKey {
        &self.location
    }

    /// Local file a published ledger is staged in
    pub fn staging_file(&self) -> PathBuf {
        self.staging_dir.join(LEDGER_FILE_NAME)
    }

    fn unavailable(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::Unavailable {
            key: self.location.to_string(),
            reason: reason.into(),
        }
    }

    fn publish_failed(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::PublishFailed {
            key: self.location.to_string(),
            reason: reason.into(),
        }
    }

    /// Fetch the ledger, sorted newest version first.
    pub async fn load_ledger(&self) -> Result<Ledger> {
        let bytes = match self.store.fetch(&self.location).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) if self.allow_missing => {
                log::warn!("No ledger at {}; starting with no prior releases", self.location);
                return Ok(Ledger::default());
            }
            Err(e) => return Err(self.unavailable(e.to_string()).into()),
        };

        let ledger = Ledger::from_json(&bytes).map_err(|e| self.unavailable(e.to_string()))?;
        log::info!("Loaded {} release(s) from {}", ledger.len(), self.location);
        Ok(ledger)
    }

    /// Write `ledger` to the staging file and upload it.
    ///
    /// On error the stored ledger may or may not have been replaced; nothing
    /// is rolled back.
    pub async fn publish_ledger(&self, ledger: &Ledger) -> Result<()> {
        let staged = self.stage(ledger).await?;

        self.store
            .store(&self.location, &staged)
            .await
            .map_err(|e| self.publish_failed(e.to_string()))?;

        log::info!("Published {} release(s) to {}", ledger.len(), self.location);
        Ok(())
    }

    /// Serialize `ledger` into the staging file, returning its path
    pub async fn stage(&self, ledger: &Ledger) -> Result<PathBuf> {
        let json = ledger
            .to_json()
            .map_err(|e| self.publish_failed(format!("Failed to serialize ledger: {e}")))?;

        let path = self.staging_file();
        write_file(&path, &json)
            .await
            .map_err(|e| self.publish_failed(format!("Failed to write {}: {e}", path.display())))?;
        Ok(path)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}
