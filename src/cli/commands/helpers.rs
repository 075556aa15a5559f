//! Shared setup for commands: configuration, store and build machine.

use crate::cli::{Args, RuntimeConfig};
use crate::config::{FirmwareConfig, RemoteKind, expand_tilde};
use crate::error::{ConfigError, Result};
use crate::remote::{LocalRunner, RemoteRunner, SshRunner, VagrantRunner};
use crate::store::{AwsCliStore, FsObjectStore, Store};

/// Key used for SSH when neither the flag nor the config names one
const DEFAULT_SSH_KEY: &str = "~/.ssh/id_rsa";

/// Load the config file.
///
/// With a store directory the file is optional: credentials are not needed.
pub(super) fn load_config(args: &Args) -> Result<FirmwareConfig> {
    if args.store_dir.is_some() {
        FirmwareConfig::load_or_default(&args.config)
    } else {
        FirmwareConfig::load(&args.config)
    }
}

/// Open the store named by `--store-dir`, or S3 with the configured credentials
pub(super) fn open_store(
    args: &Args,
    config: &FirmwareConfig,
    runtime: &RuntimeConfig,
) -> Result<Store> {
    match &args.store_dir {
        Some(dir) => {
            runtime.verbose_println(&format!("Using local store at {}", dir.display()));
            Ok(Store::Fs(FsObjectStore::new(dir)))
        }
        None => {
            let credentials = config.credentials(&args.config)?.clone();
            Ok(Store::S3(AwsCliStore::new(credentials)?))
        }
    }
}

/// Build the runner for the configured transport
pub(super) fn build_runner(
    config: &FirmwareConfig,
    ssh_key: Option<&str>,
    runtime: &RuntimeConfig,
) -> Result<RemoteRunner> {
    let remote = &config.remote;
    let runner = match remote.kind {
        RemoteKind::Vagrant => {
            let project_dir = match &remote.project_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()?,
            };
            if ssh_key.is_some() {
                log::debug!("Ignoring SSH key: vagrant manages its own");
            }
            let runner = VagrantRunner::new(project_dir)?;
            RemoteRunner::Vagrant(if runtime.is_quiet() { runner.quiet() } else { runner })
        }
        RemoteKind::Ssh => {
            let host = remote.host.clone().ok_or_else(|| ConfigError::Malformed {
                path: "remote".into(),
                reason: "remote.host is required for ssh".to_string(),
            })?;
            let key = ssh_key
                .or(remote.identity_file.as_deref())
                .unwrap_or(DEFAULT_SSH_KEY);

            let mut runner = SshRunner::new(host)?
                .port(remote.port)
                .identity_file(expand_tilde(key));
            if let Some(user) = &remote.user {
                runner = runner.user(user);
            }
            RemoteRunner::Ssh(if runtime.is_quiet() { runner.quiet() } else { runner })
        }
        RemoteKind::Local => {
            let runner = LocalRunner::new();
            RemoteRunner::Local(if runtime.is_quiet() { runner.quiet() } else { runner })
        }
    };

    runtime.verbose_println(&format!("Build machine transport: {:?}", remote.kind));
    Ok(runner)
}
