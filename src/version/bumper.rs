//! Semantic version increments.

use crate::error::{Result, VersionError};
use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;
use std::str::FromStr;

/// Kind of version increment applied to the latest release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionBump {
    /// Breaking change: `1.2.3 -> 2.0.0`
    Major,
    /// New functionality: `1.2.3 -> 1.3.0`
    Minor,
    /// Fixes only: `1.2.3 -> 1.2.4`
    #[default]
    Patch,
}

impl VersionBump {
    /// Lowercase name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::Major => "major",
            VersionBump::Minor => "minor",
            VersionBump::Patch => "patch",
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionBump {
    type Err = VersionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(VersionBump::Major),
            "minor" => Ok(VersionBump::Minor),
            "patch" => Ok(VersionBump::Patch),
            _ => Err(VersionError::InvalidIncrementKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Applies [`VersionBump`]s to a base version
#[derive(Debug, Clone)]
pub struct VersionBumper {
    current: Version,
}

impl VersionBumper {
    /// Create a bumper starting from `version`
    pub fn from_version(version: Version) -> Self {
        Self { current: version }
    }

    /// Compute the next version. Pre-release and build metadata are dropped.
    pub fn bump(&self, bump: VersionBump) -> Result<Version> {
        let v = &self.current;
        let (major, minor, patch) = match bump {
            VersionBump::Major => (v.major.checked_add(1), Some(0), Some(0)),
            VersionBump::Minor => (Some(v.major), v.minor.checked_add(1), Some(0)),
            VersionBump::Patch => (Some(v.major), Some(v.minor), v.patch.checked_add(1)),
        };

        match (major, minor, patch) {
            (Some(major), Some(minor), Some(patch)) => Ok(Version {
                major,
                minor,
                patch,
                pre: Prerelease::EMPTY,
                build: BuildMetadata::EMPTY,
            }),
            _ => Err(VersionError::InvalidVersion {
                version: v.to_string(),
                reason: format!("{bump} increment overflows"),
            }
            .into()),
        }
    }
}
