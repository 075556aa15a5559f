//! Build machine reached over plain SSH.

use super::{CommandRunner, require_binary, run_captured};
use crate::error::RemoteError;
use std::path::{Path, PathBuf};

/// Runs commands with `ssh` and retrieves files with `scp`
#[derive(Debug, Clone)]
pub struct SshRunner {
    ssh: PathBuf,
    scp: PathBuf,
    host: String,
    user: Option<String>,
    port: u16,
    identity_file: Option<PathBuf>,
    echo: bool,
}

impl SshRunner {
    /// Locate `ssh` and `scp` and target `host`
    pub fn new(host: impl Into<String>) -> Result<Self, RemoteError> {
        let ssh = require_binary("ssh")?;
        let scp = require_binary("scp")?;
        Ok(Self {
            ssh,
            scp,
            host: host.into(),
            user: None,
            port: 22,
            identity_file: None,
            echo: true,
        })
    }

    /// Log in as `user`
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Connect to `port`
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Authenticate with the private key at `path`
    pub fn identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Capture output without echoing it
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    // Batch mode so a missing key fails instead of prompting
    fn common_args(&self, port_flag: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.to_string_lossy().into_owned());
        }

        if self.port != 22 {
            args.push(port_flag.to_string());
            args.push(self.port.to_string());
        }

        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
        ]);
        args
    }
}

impl CommandRunner for SshRunner {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn command(&self, script: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.ssh);
        cmd.args(self.common_args("-p"))
            .arg(self.destination())
            .arg(script);
        cmd
    }

    fn echoes_output(&self) -> bool {
        self.echo
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        run_captured(self.command("true"), "ssh connectivity check", false).await?;
        log::info!("Connected to {}", self.destination());
        Ok(())
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::TransferFailed {
                    remote: remote.to_string(),
                    local: local.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let mut cmd = std::process::Command::new(&self.scp);
        cmd.args(self.common_args("-P"))
            .arg(format!("{}:{}", self.destination(), remote))
            .arg(local);

        let label = format!("scp {}:{}", self.destination(), remote);
        run_captured(cmd, &label, false)
            .await
            .map_err(|e| RemoteError::TransferFailed {
                remote: remote.to_string(),
                local: local.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
