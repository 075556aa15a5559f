//! Release records and the ordered ledger built from them.

use crate::error::{Result, VersionError};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// One published firmware release. Immutable once created.
///
/// Field declaration order is the serialized order: `released`, `sha`,
/// `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// When the release was published
    #[serde(rename = "released")]
    pub released_at: DateTime<Utc>,
    /// Source revision (OpenWrt commit) the release was built from
    #[serde(rename = "sha")]
    pub source_revision: String,
    /// Release version
    pub version: Version,
}

impl ReleaseRecord {
    /// Record a release happening now
    pub fn new(version: Version, source_revision: impl Into<String>) -> Self {
        Self::at(version, source_revision, Utc::now())
    }

    /// Record a release with an explicit timestamp
    pub fn at(
        version: Version,
        source_revision: impl Into<String>,
        released_at: DateTime<Utc>,
    ) -> Self {
        Self {
            released_at,
            source_revision: source_revision.into(),
            version,
        }
    }
}

/// Past releases, newest version first. No two records share a version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    records: Vec<ReleaseRecord>,
}

impl Ledger {
    /// Build a ledger from records in any order.
    ///
    /// Records are sorted descending by semantic-version precedence; a
    /// duplicated version is rejected.
    pub fn from_records(mut records: Vec<ReleaseRecord>) -> Result<Self> {
        records.sort_by(|a, b| b.version.cmp(&a.version));

        if let Some(pair) = records.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(VersionError::AlreadyReleased {
                version: pair[0].version.to_string(),
            }
            .into());
        }

        Ok(Self { records })
    }

    /// Parse the stored JSON form (an array of records).
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let records: Vec<ReleaseRecord> = serde_json::from_slice(bytes)?;
        Self::from_records(records)
    }

    /// Serialize as a 4-space indented JSON array.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.records.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Newest release, if any
    pub fn latest(&self) -> Option<&ReleaseRecord> {
        self.records.first()
    }

    /// All records, newest first
    pub fn records(&self) -> &[ReleaseRecord] {
        &self.records
    }

    /// Iterate records, newest first
    pub fn iter(&self) -> std::slice::Iter<'_, ReleaseRecord> {
        self.records.iter()
    }

    /// Number of releases
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been released yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `version` has already been released
    pub fn contains_version(&self, version: &Version) -> bool {
        self.records.iter().any(|r| &r.version == version)
    }

    /// Return a new ledger with `record` at the front.
    ///
    /// The new release is the newest one, so no re-sort happens; `self` is
    /// left untouched.
    pub fn append_release(&self, record: ReleaseRecord) -> Result<Ledger> {
        if self.contains_version(&record.version) {
            return Err(VersionError::AlreadyReleased {
                version: record.version.to_string(),
            }
            .into());
        }

        let mut records = Vec::with_capacity(self.records.len() + 1);
        records.push(record);
        records.extend(self.records.iter().cloned());
        Ok(Ledger { records })
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a ReleaseRecord;
    type IntoIter = std::slice::Iter<'a, ReleaseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
