//! RAII cleanup of the release's temporary directories.
//!
//! Dropping the guard removes every tracked remote and local path, whether
//! the run succeeded, failed, or panicked.

use crate::remote::{CommandRunner, quote};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Upper bound on each remote cleanup command
const REMOTE_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Removes temporary directories when dropped
#[derive(Debug)]
pub struct CleanupGuard {
    local: Vec<PathBuf>,
    remote: Vec<(String, std::process::Command)>,
    keep: bool,
}

impl CleanupGuard {
    /// Create a guard; with `keep` set nothing is removed
    pub fn new(keep: bool) -> Self {
        Self {
            local: Vec::new(),
            remote: Vec::new(),
            keep,
        }
    }

    /// Remove `dir` on drop
    pub fn track_local(&mut self, dir: impl Into<PathBuf>) {
        self.local.push(dir.into());
    }

    /// Remove `path` on the build machine on drop
    pub fn track_remote<R: CommandRunner>(&mut self, runner: &R, path: &str) {
        let command = runner.command(&format!("rm -rf {}", quote(path)));
        self.remote.push((path.to_string(), command));
    }

    /// Local directories that will be removed
    pub fn local_paths(&self) -> impl Iterator<Item = &Path> {
        self.local.iter().map(PathBuf::as_path)
    }

    /// Remote paths that will be removed
    pub fn remote_paths(&self) -> impl Iterator<Item = &str> {
        self.remote.iter().map(|(path, _)| path.as_str())
    }

    /// Leave everything in place
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

fn remove_remote(path: &str, command: &mut std::process::Command) {
    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::warn!("Failed to start cleanup of remote '{}': {}", path, e);
            return;
        }
    };

    match child.wait_timeout(REMOTE_CLEANUP_TIMEOUT) {
        Ok(Some(status)) if status.success() => {
            log::debug!("Removed remote '{}'", path);
        }
        Ok(Some(status)) => {
            log::warn!(
                "Failed to remove remote '{}' (exit code: {})",
                path,
                status.code().unwrap_or(-1)
            );
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!(
                "Timed out removing remote '{}' after {} seconds",
                path,
                REMOTE_CLEANUP_TIMEOUT.as_secs()
            );
        }
        Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.keep {
            for path in self.remote_paths() {
                log::info!("Keeping remote '{}'", path);
            }
            for path in self.local_paths() {
                log::info!("Keeping {}", path.display());
            }
            return;
        }

        for (path, command) in &mut self.remote {
            remove_remote(path, command);
        }

        for dir in self.local.iter().rev() {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => log::debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", dir.display(), e),
            }
        }
    }
}
