//! Vagrant-managed build box.

use super::{CommandRunner, quote, require_binary, run_captured};
use crate::error::RemoteError;
use std::path::{Path, PathBuf};

/// Guest mount point of the project directory
pub const GUEST_MOUNT: &str = "/vagrant";

/// Runs commands with `vagrant ssh -c` inside the project's Vagrant box.
///
/// Files are retrieved by copying them into the synced folder, so local
/// destinations must live under the project directory.
#[derive(Debug, Clone)]
pub struct VagrantRunner {
    program: PathBuf,
    project_dir: PathBuf,
    echo: bool,
}

impl VagrantRunner {
    /// Locate `vagrant` and bind to the box defined in `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Result<Self, RemoteError> {
        let program = require_binary("vagrant")?;
        Ok(Self::with_program(program, project_dir))
    }

    /// Use a specific `vagrant` executable
    pub fn with_program(program: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let project_dir = std::fs::canonicalize(&project_dir).unwrap_or(project_dir);
        Self {
            program: program.into(),
            project_dir,
            echo: true,
        }
    }

    /// Capture output without echoing it
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Project directory holding the Vagrantfile
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Path on the guest that `local` is synced to
    pub fn guest_path(&self, local: &Path) -> Option<String> {
        let relative = local.strip_prefix(&self.project_dir).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            Some(GUEST_MOUNT.to_string())
        } else {
            Some(format!("{}/{}", GUEST_MOUNT, parts.join("/")))
        }
    }
}

impl CommandRunner for VagrantRunner {
    fn name(&self) -> &'static str {
        "vagrant"
    }

    fn command(&self, script: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(["ssh", "-c", script]).current_dir(&self.project_dir);
        cmd
    }

    fn echoes_output(&self) -> bool {
        self.echo
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.arg("up").current_dir(&self.project_dir);
        run_captured(cmd, "vagrant up", self.echo).await?;
        Ok(())
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        let transfer_failed = |reason: String| RemoteError::TransferFailed {
            remote: remote.to_string(),
            local: local.to_path_buf(),
            reason,
        };

        let guest = self.guest_path(local).ok_or_else(|| {
            transfer_failed(format!(
                "destination is outside the synced folder {}",
                self.project_dir.display()
            ))
        })?;
        let guest_parent = guest
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .filter(|parent| !parent.is_empty())
            .unwrap_or(GUEST_MOUNT);

        let script = format!(
            "mkdir -p {} && cp {} {}",
            quote(guest_parent),
            quote(remote),
            quote(&guest)
        );
        self.execute(&script)
            .await
            .map_err(|e| transfer_failed(e.to_string()))?;
        Ok(())
    }
}
