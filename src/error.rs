//! Error types for firmware release operations.
//!
//! Every failure is terminal for the current run. The top-level
//! [`ReleaseError`] carries actionable recovery suggestions for the operator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for firmware release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all firmware release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Version resolution errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Release ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Remote command errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Object store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Version resolution errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Version string is not a well-formed semantic version
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// Version string
        version: String,
        /// Reason for the error
        reason: String,
    },

    /// Increment kind is not one of major, minor, patch
    #[error("Invalid increment kind '{kind}'. Expected one of: major, minor, patch")]
    InvalidIncrementKind {
        /// Increment kind as given
        kind: String,
    },

    /// No prior release to increment from
    #[error("Unable to deduce new version: no prior releases found and no version explicitly set")]
    NoBaseVersion,

    /// Version is already present in the ledger
    #[error("Version '{version}' has already been released")]
    AlreadyReleased {
        /// Version string
        version: String,
    },
}

/// Release ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger blob is missing or could not be parsed
    #[error("Release ledger '{key}' unavailable: {reason}")]
    Unavailable {
        /// Object key of the ledger
        key: String,
        /// Reason for the error
        reason: String,
    },

    /// Ledger could not be written back to the store
    #[error("Failed to publish release ledger '{key}': {reason}")]
    PublishFailed {
        /// Object key of the ledger
        key: String,
        /// Reason for the error
        reason: String,
    },
}

/// Remote command errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Command ran but exited unsuccessfully
    #[error("Command failed with exit code {code}: {command}")]
    ExitFailure {
        /// Command that failed
        command: String,
        /// Exit code (-1 when killed by a signal)
        code: i32,
        /// Captured stderr
        stderr: String,
    },

    /// Command could not be started
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Required executable is not on PATH
    #[error("Required program '{program}' not found on PATH")]
    MissingBinary {
        /// Program name
        program: String,
    },

    /// File could not be retrieved from the build machine
    #[error("Failed to retrieve '{remote}' into {local}: {reason}")]
    TransferFailed {
        /// Remote path
        remote: String,
        /// Local destination
        local: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Object store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object does not exist
    #[error("Object s3://{bucket}/{key} not found")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Transport failure before any data was written
    #[error("Transfer of s3://{bucket}/{key} failed: {reason}")]
    Transport {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Reason for the error
        reason: String,
    },

    /// Upload started but did not complete
    #[error("Upload to s3://{bucket}/{key} failed: {reason}")]
    UploadFailed {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Reason for the error
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("Config file not found at {path}")]
    NotFound {
        /// Expected path
        path: PathBuf,
    },

    /// Config file could not be parsed
    #[error("Malformed config file {path}: {reason}")]
    Malformed {
        /// Path to config file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Store credentials are required but absent
    #[error("AWS credentials missing from config file {path}")]
    MissingCredentials {
        /// Path to config file
        path: PathBuf,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Operator interrupted the run
    #[error("Interrupted while running {command}")]
    Interrupted {
        /// Command that was running
        command: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Version(VersionError::InvalidVersion { .. }) => vec![
                "Pass a full semantic version, e.g. --release-version 1.2.3".to_string(),
                "Omit --release-version to increment from the latest release".to_string(),
            ],
            ReleaseError::Version(VersionError::InvalidIncrementKind { .. }) => {
                vec!["Use --semver major, --semver minor or --semver patch".to_string()]
            }
            ReleaseError::Version(VersionError::NoBaseVersion) => vec![
                "Set the first version explicitly: --release-version 0.0.1".to_string(),
            ],
            ReleaseError::Version(VersionError::AlreadyReleased { version }) => vec![
                format!("Version {version} is already in the ledger; choose another version"),
                "Run `firmware_release history` to list published releases".to_string(),
            ],
            ReleaseError::Ledger(LedgerError::Unavailable { .. }) => vec![
                "Check the bucket and prefix in the config file".to_string(),
                "Use --allow-empty-ledger when publishing the very first release".to_string(),
            ],
            ReleaseError::Ledger(LedgerError::PublishFailed { .. }) => vec![
                "The remote ledger may not have been updated; verify it before retrying"
                    .to_string(),
            ],
            ReleaseError::Store(StoreError::UploadFailed { key, .. }) => vec![
                format!("'{key}' may be partially written; it is replaced on the next upload"),
                "The ledger was not updated; rerun the release".to_string(),
            ],
            ReleaseError::Cli(CliError::Interrupted { .. }) => vec![
                "Temporary folders were removed; rerun when ready".to_string(),
                "If the interrupt came during upload, check `firmware_release history`"
                    .to_string(),
            ],
            ReleaseError::Remote(RemoteError::MissingBinary { program }) => {
                vec![format!("Install '{program}' and make sure it is on PATH")]
            }
            ReleaseError::Remote(RemoteError::ExitFailure { .. }) => vec![
                "Inspect the build output above for the failing step".to_string(),
                "Check that the build machine is up: vagrant status".to_string(),
            ],
            ReleaseError::Config(ConfigError::NotFound { .. })
            | ReleaseError::Config(ConfigError::MissingCredentials { .. }) => vec![
                "Pass the config path with --config <file>".to_string(),
                "Use --store-dir <dir> to publish into a local directory instead".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// False when the failure happened after an upload started, so remote
    /// state may be partially updated
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ReleaseError::Ledger(LedgerError::PublishFailed { .. })
                | ReleaseError::Store(StoreError::UploadFailed { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_version_is_recoverable() {
        let err: ReleaseError = VersionError::AlreadyReleased {
            version: "0.0.1".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_failed_archive_upload_not_recoverable() {
        let err: ReleaseError = StoreError::UploadFailed {
            bucket: "builds.tessel.io".to_string(),
            key: "t2/firmware/abc.tar.gz".to_string(),
            reason: "connection reset".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());

        let err: ReleaseError = StoreError::Transport {
            bucket: "builds.tessel.io".to_string(),
            key: "t2/firmware/builds.json".to_string(),
            reason: "aws not found".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_nested_error_display() {
        let err: ReleaseError = VersionError::NoBaseVersion.into();
        assert!(err.to_string().starts_with("Version error:"));
    }

    #[test]
    fn test_publish_failure_not_recoverable() {
        let err: ReleaseError = LedgerError::PublishFailed {
            key: "t2/firmware/builds.json".to_string(),
            reason: "connection reset".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
    }
}
