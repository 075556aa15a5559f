//! Release configuration file.
//!
//! A JSON document with camelCase keys. Every section is optional; defaults
//! describe the Tessel 2 build machine.

use crate::error::{ConfigError, Result};
use crate::store::{DEFAULT_BUCKET, DEFAULT_PREFIX, StoreLayout};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "../config.json";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmwareConfig {
    /// Credentials for the S3 store
    pub aws_credentials: Option<AwsCredentials>,
    /// Bucket holding the ledger and archives
    pub bucket: String,
    /// Key prefix inside the bucket
    pub prefix: String,
    /// Build machine connection
    pub remote: RemoteConfig,
    /// Build trees and commands on the build machine
    pub build: BuildConfig,
    /// Files retrieved from the build machine after building
    pub artifacts: Vec<ArtifactConfig>,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            aws_credentials: None,
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            remote: RemoteConfig::default(),
            build: BuildConfig::default(),
            artifacts: ArtifactConfig::defaults(),
        }
    }
}

/// S3 credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<String>,
    /// Region of the bucket
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

/// How commands reach the build machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// `vagrant ssh -c` against the Vagrant box in the project directory
    #[default]
    Vagrant,
    /// Plain `ssh` to a host
    Ssh,
    /// Run on this machine
    Local,
}

/// Build machine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    /// Transport
    pub kind: RemoteKind,
    /// SSH host
    pub host: Option<String>,
    /// SSH user
    pub user: Option<String>,
    /// SSH port
    pub port: u16,
    /// SSH private key (`~` is expanded)
    pub identity_file: Option<String>,
    /// Vagrant project directory, shared with the guest as `/vagrant`
    pub project_dir: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::default(),
            host: None,
            user: None,
            port: 22,
            identity_file: None,
            project_dir: None,
        }
    }
}

/// Build trees and commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// OpenWrt checkout; its HEAD is the release's source revision
    pub openwrt_dir: String,
    /// Firmware checkout
    pub firmware_dir: String,
    /// Commands run in `openwrt_dir`, in order
    pub openwrt_commands: Vec<String>,
    /// Commands run in `firmware_dir`, in order
    pub firmware_commands: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            openwrt_dir: "/work/openwrt-tessel".to_string(),
            firmware_dir: "/work/t2-firmware".to_string(),
            // The OpenWrt tree needs repeated passes; the last one is verbose for diagnosis
            openwrt_commands: vec![
                "make -j64".to_string(),
                "make -j64".to_string(),
                "make -j64 V=s".to_string(),
            ],
            firmware_commands: vec!["make -j64".to_string()],
        }
    }
}

/// One file retrieved from the build machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactConfig {
    /// Absolute path on the build machine
    pub remote: String,
    /// Destination relative to the local release folder
    pub local: PathBuf,
}

impl ArtifactConfig {
    fn defaults() -> Vec<Self> {
        vec![
            Self {
                remote: "/work/t2-firmware/build/firmware.bin".to_string(),
                local: PathBuf::from("firmware.bin"),
            },
            Self {
                remote: "/work/openwrt-tessel/openwrt/bin/ramips/openwrt-ramips-mt7620-tessel-squashfs-sysupgrade.bin".to_string(),
                local: PathBuf::from("linux/openwrt.bin"),
            },
        ]
    }
}

impl FirmwareConfig {
    /// Read and parse the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Malformed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        Self::parse(&contents, path)
    }

    /// Like [`FirmwareConfig::load`], but a missing file yields defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_str(contents).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let malformed = |reason: String| ConfigError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        if self.bucket.trim().is_empty() {
            return Err(malformed("bucket must not be empty".to_string()).into());
        }
        for artifact in &self.artifacts {
            if artifact.local.is_absolute()
                || artifact
                    .local
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(malformed(format!(
                    "artifact destination '{}' must stay inside the release folder",
                    artifact.local.display()
                ))
                .into());
            }
        }
        if self.remote.kind == RemoteKind::Ssh && self.remote.host.is_none() {
            return Err(malformed("remote.host is required for ssh".to_string()).into());
        }
        Ok(())
    }

    /// Store layout described by this config
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(self.bucket.clone(), &self.prefix)
    }

    /// Credentials, required by the S3 store
    pub fn credentials(&self, path: &Path) -> Result<&AwsCredentials> {
        self.aws_credentials.as_ref().ok_or_else(|| {
            ConfigError::MissingCredentials {
                path: path.to_path_buf(),
            }
            .into()
        })
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = FirmwareConfig::parse("{}", Path::new("config.json")).unwrap();
        assert_eq!(config.bucket, "builds.tessel.io");
        assert_eq!(config.prefix, "t2/firmware");
        assert_eq!(config.remote.kind, RemoteKind::Vagrant);
        assert_eq!(config.build.openwrt_commands.len(), 3);
        assert_eq!(config.artifacts.len(), 2);
        assert!(config.aws_credentials.is_none());
    }

    #[test]
    fn test_parses_credentials_and_overrides() {
        let json = r#"{
            "awsCredentials": { "accessKeyId": "AKIA", "secretAccessKey": "s3cr3t" },
            "bucket": "other",
            "remote": { "kind": "ssh", "host": "build.local", "user": "ci" }
        }"#;
        let config = FirmwareConfig::parse(json, Path::new("config.json")).unwrap();
        let creds = config.credentials(Path::new("config.json")).unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(config.layout().ledger_key().bucket, "other");
        assert_eq!(config.remote.port, 22);
        assert!(!format!("{creds:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_ssh_requires_host() {
        let json = r#"{ "remote": { "kind": "ssh" } }"#;
        assert!(FirmwareConfig::parse(json, Path::new("c.json")).is_err());
    }

    #[test]
    fn test_artifact_must_stay_inside_release_folder() {
        let json = r#"{ "artifacts": [{ "remote": "/a", "local": "../escape.bin" }] }"#;
        assert!(FirmwareConfig::parse(json, Path::new("c.json")).is_err());
    }

    #[test]
    fn test_missing_credentials() {
        let config = FirmwareConfig::default();
        assert!(config.credentials(Path::new("c.json")).is_err());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = FirmwareConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReleaseError::Config(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        assert_eq!(expand_tilde("/etc/key"), PathBuf::from("/etc/key"));
    }
}
