//! Version resolution for firmware releases.
//!
//! Computing the next version is a pure function over a loaded ledger
//! snapshot; nothing in this module touches storage.

mod bumper;

pub use bumper::{VersionBump, VersionBumper};

use crate::error::{Result, VersionError};
use crate::ledger::Ledger;
use semver::Version;

/// Strictly parse a semantic version (`major.minor.patch[-pre][+build]`).
pub fn parse_version(version: &str) -> Result<Version> {
    Version::parse(version.trim()).map_err(|e| {
        VersionError::InvalidVersion {
            version: version.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Decide the version of the release being built.
///
/// An explicit `requested` version wins and is returned as-is once it parses;
/// it is not compared against the ledger. Otherwise `increment` is applied to
/// the newest version in `ledger`.
pub fn resolve_next_version(
    ledger: &Ledger,
    requested: Option<&str>,
    increment: &str,
) -> Result<Version> {
    if let Some(requested) = requested {
        return parse_version(requested);
    }

    let latest = ledger.latest().ok_or(VersionError::NoBaseVersion)?;
    let bump: VersionBump = increment.parse()?;

    VersionBumper::from_version(latest.version.clone()).bump(bump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use crate::ledger::ReleaseRecord;

    fn ledger_with(versions: &[&str]) -> Ledger {
        Ledger::from_records(
            versions
                .iter()
                .map(|v| ReleaseRecord::new(Version::parse(v).unwrap(), format!("sha-{v}")))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_increments_latest_release() {
        let ledger = ledger_with(&["1.0.0", "1.2.3", "0.9.9"]);
        assert_eq!(resolve_next_version(&ledger, None, "patch").unwrap().to_string(), "1.2.4");
        assert_eq!(resolve_next_version(&ledger, None, "minor").unwrap().to_string(), "1.3.0");
        assert_eq!(resolve_next_version(&ledger, None, "major").unwrap().to_string(), "2.0.0");
    }

    #[test]
    fn test_requested_version_is_returned_unchanged() {
        let ledger = ledger_with(&["5.0.0"]);
        let v = resolve_next_version(&ledger, Some("0.1.0"), "bogus").unwrap();
        assert_eq!(v.to_string(), "0.1.0");
    }

    #[test]
    fn test_malformed_requested_version() {
        let ledger = ledger_with(&["1.0.0"]);
        let err = resolve_next_version(&ledger, Some("v1.2"), "patch").unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Version(VersionError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_empty_ledger_has_no_base() {
        let err = resolve_next_version(&Ledger::default(), None, "patch").unwrap_err();
        assert!(matches!(err, ReleaseError::Version(VersionError::NoBaseVersion)));
    }

    #[test]
    fn test_invalid_increment_kind() {
        let ledger = ledger_with(&["1.0.0"]);
        let err = resolve_next_version(&ledger, None, "huge").unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Version(VersionError::InvalidIncrementKind { .. })
        ));
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        let ledger = ledger_with(&["2.0.0-rc.1", "1.9.0"]);
        assert_eq!(ledger.latest().unwrap().version.to_string(), "2.0.0-rc.1");

        let ledger = ledger_with(&["2.0.0-rc.1", "2.0.0"]);
        assert_eq!(resolve_next_version(&ledger, None, "patch").unwrap().to_string(), "2.0.1");
    }
}
