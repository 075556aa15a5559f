//! Build on this machine.

use super::CommandRunner;
use crate::error::RemoteError;
use std::path::{Path, PathBuf};

/// Runs commands with `sh -c`; files are plain copies
#[derive(Debug, Clone)]
pub struct LocalRunner {
    shell: PathBuf,
    echo: bool,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
            echo: true,
        }
    }
}

impl LocalRunner {
    /// Runner using `sh`
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture output without echoing it
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }
}

impl CommandRunner for LocalRunner {
    fn name(&self) -> &'static str {
        "local"
    }

    fn command(&self, script: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.shell);
        cmd.arg("-c").arg(script);
        cmd
    }

    fn echoes_output(&self) -> bool {
        self.echo
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        let transfer_failed = |e: std::io::Error| RemoteError::TransferFailed {
            remote: remote.to_string(),
            local: local.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(transfer_failed)?;
        }
        tokio::fs::copy(remote, local).await.map_err(transfer_failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = LocalRunner::new().quiet();

        let src = tmp.path().join("firmware.bin");
        let script = format!("printf fw > {}", super::super::quote(&src.to_string_lossy()));
        runner.execute(&script).await.unwrap();

        let dest = tmp.path().join("out/linux/firmware.bin");
        runner.fetch_file(&src.to_string_lossy(), &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"fw");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalRunner::new()
            .fetch_file("/nonexistent/file", &tmp.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::TransferFailed { .. }));
    }
}
