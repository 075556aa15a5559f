//! Immutable state threaded through the release stages.
//!
//! Each stage takes a [`ReleaseContext`] by value and returns a new one with
//! the facts it established filled in.

use super::archive::ArchiveInfo;
use crate::error::{CliError, ReleaseError, Result};
use crate::ledger::Ledger;
use crate::store::archive_file_name;
use crate::version::VersionBump;
use semver::Version;
use std::path::{Path, PathBuf};

/// Subdirectory of the release folder that is archived
pub const LINUX_DIR: &str = "linux";

/// What the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Explicit version, bypassing the increment
    pub requested_version: Option<String>,
    /// Increment kind applied to the latest release
    pub increment: String,
}

impl Default for ReleaseRequest {
    fn default() -> Self {
        Self {
            requested_version: None,
            increment: VersionBump::default().to_string(),
        }
    }
}

/// Facts accumulated by the pipeline so far
#[derive(Debug, Clone, Default)]
pub struct ReleaseContext {
    request: ReleaseRequest,
    source_revision: Option<String>,
    release_dir: Option<PathBuf>,
    ledger: Option<Ledger>,
    release_version: Option<Version>,
    archive: Option<ArchiveInfo>,
    updated_ledger: Option<Ledger>,
}

fn missing(what: &str) -> ReleaseError {
    CliError::ExecutionFailed {
        command: "release pipeline".to_string(),
        reason: format!("{what} is not known yet"),
    }
    .into()
}

impl ReleaseContext {
    /// Start a run for `request`
    pub fn new(request: ReleaseRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    /// The operator's request
    pub fn request(&self) -> &ReleaseRequest {
        &self.request
    }

    /// Record the source revision being released
    pub fn with_source_revision(self, sha: impl Into<String>) -> Self {
        Self {
            source_revision: Some(sha.into()),
            ..self
        }
    }

    /// Record the local release folder
    pub fn with_release_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            release_dir: Some(dir.into()),
            ..self
        }
    }

    /// Record the loaded ledger snapshot
    pub fn with_ledger(self, ledger: Ledger) -> Self {
        Self {
            ledger: Some(ledger),
            ..self
        }
    }

    /// Record the version being released
    pub fn with_release_version(self, version: Version) -> Self {
        Self {
            release_version: Some(version),
            ..self
        }
    }

    /// Record the created archive
    pub fn with_archive(self, archive: ArchiveInfo) -> Self {
        Self {
            archive: Some(archive),
            ..self
        }
    }

    /// Record the ledger including this release
    pub fn with_updated_ledger(self, ledger: Ledger) -> Self {
        Self {
            updated_ledger: Some(ledger),
            ..self
        }
    }

    /// Source revision
    pub fn source_revision(&self) -> Result<&str> {
        self.source_revision
            .as_deref()
            .ok_or_else(|| missing("source revision"))
    }

    /// Local release folder
    pub fn release_dir(&self) -> Result<&Path> {
        self.release_dir
            .as_deref()
            .ok_or_else(|| missing("release folder"))
    }

    /// Ledger snapshot loaded at the start of the run
    pub fn ledger(&self) -> Result<&Ledger> {
        self.ledger.as_ref().ok_or_else(|| missing("release ledger"))
    }

    /// Version being released
    pub fn release_version(&self) -> Result<&Version> {
        self.release_version
            .as_ref()
            .ok_or_else(|| missing("release version"))
    }

    /// Artifact archive
    pub fn archive(&self) -> Result<&ArchiveInfo> {
        self.archive.as_ref().ok_or_else(|| missing("artifact archive"))
    }

    /// Ledger including this release
    pub fn updated_ledger(&self) -> Result<&Ledger> {
        self.updated_ledger
            .as_ref()
            .ok_or_else(|| missing("updated ledger"))
    }

    /// `<release>/linux`, the directory that gets archived
    pub fn linux_dir(&self) -> Result<PathBuf> {
        Ok(self.release_dir()?.join(LINUX_DIR))
    }

    /// `<release>/<sha>.tar.gz`
    pub fn archive_path(&self) -> Result<PathBuf> {
        let name = archive_file_name(self.source_revision()?);
        Ok(self.release_dir()?.join(name))
    }
}
