//! Running commands on the build machine.
//!
//! A [`CommandRunner`] turns a shell script into a process (over Vagrant,
//! SSH, or the local shell), runs it to completion and returns its trimmed
//! stdout. Output is echoed live; the build steps take a long time.

mod local;
mod ssh;
mod vagrant;

pub use local::LocalRunner;
pub use ssh::SshRunner;
pub use vagrant::VagrantRunner;

use crate::error::RemoteError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};

/// Executes shell scripts on the build machine.
///
/// Calls block the caller until the command exits; no timeout is imposed.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Short transport name for messages
    fn name(&self) -> &'static str;

    /// Process that runs `script` on the build machine.
    ///
    /// Also used from synchronous contexts (cleanup on drop).
    fn command(&self, script: &str) -> std::process::Command;

    /// Whether command output is echoed to the terminal while captured
    fn echoes_output(&self) -> bool {
        true
    }

    /// Make sure the build machine is up and reachable
    async fn connect(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    /// Run `script`, returning trimmed stdout or the exit failure
    async fn execute(&self, script: &str) -> Result<String, RemoteError> {
        run_captured(self.command(script), script, self.echoes_output()).await
    }

    /// Copy `remote` from the build machine to `local`
    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError>;
}

/// Transport chosen at startup
#[derive(Debug, Clone)]
pub enum RemoteRunner {
    /// Vagrant box
    Vagrant(VagrantRunner),
    /// SSH host
    Ssh(SshRunner),
    /// This machine
    Local(LocalRunner),
}

impl CommandRunner for RemoteRunner {
    fn name(&self) -> &'static str {
        match self {
            RemoteRunner::Vagrant(r) => r.name(),
            RemoteRunner::Ssh(r) => r.name(),
            RemoteRunner::Local(r) => r.name(),
        }
    }

    fn command(&self, script: &str) -> std::process::Command {
        match self {
            RemoteRunner::Vagrant(r) => r.command(script),
            RemoteRunner::Ssh(r) => r.command(script),
            RemoteRunner::Local(r) => r.command(script),
        }
    }

    fn echoes_output(&self) -> bool {
        match self {
            RemoteRunner::Vagrant(r) => r.echoes_output(),
            RemoteRunner::Ssh(r) => r.echoes_output(),
            RemoteRunner::Local(r) => r.echoes_output(),
        }
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        match self {
            RemoteRunner::Vagrant(r) => r.connect().await,
            RemoteRunner::Ssh(r) => r.connect().await,
            RemoteRunner::Local(r) => r.connect().await,
        }
    }

    async fn execute(&self, script: &str) -> Result<String, RemoteError> {
        match self {
            RemoteRunner::Vagrant(r) => r.execute(script).await,
            RemoteRunner::Ssh(r) => r.execute(script).await,
            RemoteRunner::Local(r) => r.execute(script).await,
        }
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        match self {
            RemoteRunner::Vagrant(r) => r.fetch_file(remote, local).await,
            RemoteRunner::Ssh(r) => r.fetch_file(remote, local).await,
            RemoteRunner::Local(r) => r.fetch_file(remote, local).await,
        }
    }
}

/// Quote a value for a POSIX shell (always single-quoted).
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Locate `program` on PATH
pub(crate) fn require_binary(program: &str) -> Result<std::path::PathBuf, RemoteError> {
    which::which(program).map_err(|_| RemoteError::MissingBinary {
        program: program.to_string(),
    })
}

#[derive(Clone, Copy)]
enum Echo {
    Off,
    Stdout,
    Stderr,
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// `label` names the command in errors and logs. Returns trimmed stdout.
pub(crate) async fn run_captured(
    command: std::process::Command,
    label: &str,
    echo: bool,
) -> Result<String, RemoteError> {
    log::debug!("executing: {}", label);

    let mut cmd = tokio::process::Command::from(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| RemoteError::SpawnFailed {
        command: label.to_string(),
        reason: e.to_string(),
    })?;

    let (out_echo, err_echo) = if echo {
        (Echo::Stdout, Echo::Stderr)
    } else {
        (Echo::Off, Echo::Off)
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::join!(drain(stdout, out_echo), drain(stderr, err_echo));

    let status = child.wait().await.map_err(|e| RemoteError::SpawnFailed {
        command: label.to_string(),
        reason: e.to_string(),
    })?;

    if !status.success() {
        return Err(RemoteError::ExitFailure {
            command: label.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    log::debug!("done: {}", label);
    Ok(stdout.trim().to_string())
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, echo: Echo) -> String {
    let Some(reader) = reader else {
        return String::new();
    };

    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let _ = match echo {
                    Echo::Off => Ok(()),
                    Echo::Stdout => tokio::io::stdout().write_all(&buf).await,
                    Echo::Stderr => tokio::io::stderr().write_all(&buf).await,
                };
                collected.push_str(&String::from_utf8_lossy(&buf));
            }
        }
    }

    collected
}
