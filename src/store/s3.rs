//! S3 backend driving the `aws` command line client.

use super::{ObjectKey, ObjectStore};
use crate::config::AwsCredentials;
use crate::error::StoreError;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Object store backed by `aws s3 cp`.
///
/// Credentials are handed to the child process environment only.
#[derive(Debug, Clone)]
pub struct AwsCliStore {
    program: PathBuf,
    credentials: AwsCredentials,
}

impl AwsCliStore {
    /// Locate the `aws` binary and bind it to `credentials`
    pub fn new(credentials: AwsCredentials) -> Result<Self, StoreError> {
        let program = which::which("aws").map_err(|e| StoreError::Transport {
            bucket: String::new(),
            key: String::new(),
            reason: format!("aws CLI not found on PATH: {e}"),
        })?;
        Ok(Self::with_program(program, credentials))
    }

    /// Use a specific `aws` executable
    pub fn with_program(program: impl Into<PathBuf>, credentials: AwsCredentials) -> Self {
        Self {
            program: program.into(),
            credentials,
        }
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.env("AWS_ACCESS_KEY_ID", &self.credentials.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &self.credentials.secret_access_key)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(token) = &self.credentials.session_token {
            cmd.env("AWS_SESSION_TOKEN", token);
        }
        if let Some(region) = &self.credentials.region {
            cmd.env("AWS_DEFAULT_REGION", region);
        }
        cmd
    }
}

/// Whether `aws s3 cp` stderr describes a missing object
fn is_missing_object(stderr: &str) -> bool {
    ["(404)", "NoSuchKey", "Not Found", "does not exist"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

impl ObjectStore for AwsCliStore {
    async fn fetch(&self, object: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        log::debug!("aws s3 cp {} -", object);

        let output = self
            .command()
            .args(["s3", "cp", "--only-show-errors"])
            .arg(object.to_string())
            .arg("-")
            .output()
            .await
            .map_err(|e| object.transport(format!("Failed to run aws: {e}")))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_object(&stderr) {
            Err(object.not_found())
        } else {
            Err(object.transport(stderr.trim().to_string()))
        }
    }

    async fn store(&self, object: &ObjectKey, local_path: &Path) -> Result<(), StoreError> {
        log::info!("Uploading {} to {}", local_path.display(), object);

        let output = self
            .command()
            .args(["s3", "cp", "--only-show-errors"])
            .arg(local_path)
            .arg(object.to_string())
            .output()
            .await
            .map_err(|e| object.transport(format!("Failed to run aws: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(object.upload_failed(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_object_detection() {
        assert!(is_missing_object(
            "fatal error: An error occurred (404) when calling the HeadObject operation: Key \"t2/firmware/builds.json\" does not exist"
        ));
        assert!(is_missing_object("An error occurred (NoSuchKey) when calling the GetObject operation"));
        assert!(!is_missing_object("An error occurred (AccessDenied) when calling the GetObject operation"));
    }
}
