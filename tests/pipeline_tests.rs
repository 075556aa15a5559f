//! End-to-end release runs against a local shell and a directory store.

use firmware_release::cli::RuntimeConfig;
use firmware_release::config::{ArtifactConfig, BuildConfig, FirmwareConfig, RemoteConfig, RemoteKind};
use firmware_release::error::{RemoteError, ReleaseError, VersionError};
use firmware_release::ledger::{Ledger, ReleaseRecord};
use firmware_release::pipeline::{PipelineOptions, ReleasePipeline, ReleaseRequest};
use firmware_release::remote::{CommandRunner, LocalRunner};
use firmware_release::store::{FsObjectStore, StoreLayout};
use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::Notify;

const SHA: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

/// Local shell, except that the source revision is fixed
struct FixedRevisionRunner {
    inner: LocalRunner,
    scripts: Mutex<Vec<String>>,
}

impl FixedRevisionRunner {
    fn new() -> Self {
        Self {
            inner: LocalRunner::new().quiet(),
            scripts: Mutex::new(Vec::new()),
        }
    }

    fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl CommandRunner for FixedRevisionRunner {
    fn name(&self) -> &'static str {
        "test"
    }

    fn command(&self, script: &str) -> std::process::Command {
        self.inner.command(script)
    }

    fn echoes_output(&self) -> bool {
        false
    }

    async fn execute(&self, script: &str) -> Result<String, RemoteError> {
        self.scripts.lock().unwrap().push(script.to_string());
        if script.contains("git rev-parse") {
            return Ok(SHA.to_string());
        }
        self.inner.execute(script).await
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        self.inner.fetch_file(remote, local).await
    }
}

/// Stalls forever on the first artifact download
struct StallingRunner {
    inner: FixedRevisionRunner,
    stalled: Notify,
    fetched: Mutex<Option<PathBuf>>,
}

impl StallingRunner {
    fn new() -> Self {
        Self {
            inner: FixedRevisionRunner::new(),
            stalled: Notify::new(),
            fetched: Mutex::new(None),
        }
    }
}

impl CommandRunner for StallingRunner {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn command(&self, script: &str) -> std::process::Command {
        self.inner.command(script)
    }

    async fn execute(&self, script: &str) -> Result<String, RemoteError> {
        self.inner.execute(script).await
    }

    async fn fetch_file(&self, remote: &str, _local: &Path) -> Result<(), RemoteError> {
        *self.fetched.lock().unwrap() = Some(PathBuf::from(remote));
        self.stalled.notify_one();
        std::future::pending().await
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    config: FirmwareConfig,
    store: FsObjectStore,
}

impl Fixture {
    fn new(openwrt_commands: &[&str]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let openwrt = root.join("openwrt");
        let firmware = root.join("firmware");
        std::fs::create_dir_all(&openwrt).unwrap();
        std::fs::create_dir_all(&firmware).unwrap();

        let config = FirmwareConfig {
            remote: RemoteConfig {
                kind: RemoteKind::Local,
                ..RemoteConfig::default()
            },
            build: BuildConfig {
                openwrt_dir: openwrt.to_string_lossy().into_owned(),
                firmware_dir: firmware.to_string_lossy().into_owned(),
                openwrt_commands: openwrt_commands.iter().map(|c| c.to_string()).collect(),
                firmware_commands: vec!["printf firmware > firmware.bin".to_string()],
            },
            artifacts: vec![
                ArtifactConfig {
                    remote: firmware.join("firmware.bin").to_string_lossy().into_owned(),
                    local: PathBuf::from("firmware.bin"),
                },
                ArtifactConfig {
                    remote: openwrt.join("openwrt.bin").to_string_lossy().into_owned(),
                    local: PathBuf::from("linux/openwrt.bin"),
                },
            ],
            ..FirmwareConfig::default()
        };

        let store = FsObjectStore::new(root.join("bucket-root"));
        Self {
            _tmp: tmp,
            root,
            config,
            store,
        }
    }

    fn seed_ledger(&self, records: Vec<ReleaseRecord>) {
        let ledger = Ledger::from_records(records).unwrap();
        let path = self
            .store
            .path_for(&StoreLayout::default().ledger_key())
            .unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, ledger.to_json().unwrap()).unwrap();
    }

    fn stored_ledger(&self) -> Option<Ledger> {
        let path = self
            .store
            .path_for(&StoreLayout::default().ledger_key())
            .unwrap();
        std::fs::read(path).ok().map(|b| Ledger::from_json(&b).unwrap())
    }

    fn stored_archive(&self) -> PathBuf {
        self.store
            .path_for(&StoreLayout::default().archive_key(SHA))
            .unwrap()
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            release_dir: self.root.join("build"),
            ..PipelineOptions::default()
        }
    }
}

fn record(version: &str, day: u32) -> ReleaseRecord {
    ReleaseRecord::at(
        Version::parse(version).unwrap(),
        format!("{day:040}"),
        Utc.with_ymd_and_hms(2016, 5, day, 12, 0, 0).unwrap(),
    )
}

const GOOD_BUILD: &[&str] = &["false", "printf openwrt > openwrt.bin"];

#[tokio::test]
async fn test_release_publishes_archive_and_ledger() {
    let fixture = Fixture::new(GOOD_BUILD);
    fixture.seed_ledger(vec![record("0.0.1", 1), record("0.0.2", 2)]);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);

    let outcome = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output)
        .run(ReleaseRequest::default())
        .await
        .unwrap();

    assert!(outcome.published);
    assert_eq!(outcome.version, Version::new(0, 0, 3));
    assert_eq!(outcome.source_revision, SHA);

    let ledger = fixture.stored_ledger().unwrap();
    assert_eq!(ledger.len(), 3);
    let latest = ledger.latest().unwrap();
    assert_eq!(latest.version, Version::new(0, 0, 3));
    assert_eq!(latest.source_revision, SHA);

    // The archive holds the contents of linux/ only
    let archive = std::fs::File::open(fixture.stored_archive()).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(archive));
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.ends_with("openwrt.bin")));
    assert!(!names.iter().any(|n| n.ends_with("firmware.bin")));

    // Temporary folders are gone
    assert!(!fixture.root.join("build").exists());
}

#[tokio::test]
async fn test_dry_run_uploads_nothing() {
    let fixture = Fixture::new(GOOD_BUILD);
    fixture.seed_ledger(vec![record("1.2.3", 1)]);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);
    let options = PipelineOptions {
        dry_run: true,
        ..fixture.options()
    };

    let outcome = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, options, &output)
        .run(ReleaseRequest {
            requested_version: None,
            increment: "minor".to_string(),
        })
        .await
        .unwrap();

    assert!(!outcome.published);
    assert_eq!(outcome.version, Version::new(1, 3, 0));
    assert_eq!(outcome.ledger.len(), 2);
    assert_eq!(fixture.stored_ledger().unwrap().len(), 1);
    assert!(!fixture.stored_archive().exists());
}

#[tokio::test]
async fn test_explicit_version_on_empty_store() {
    let fixture = Fixture::new(GOOD_BUILD);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);
    let options = PipelineOptions {
        allow_empty_ledger: true,
        keep_temp: true,
        ..fixture.options()
    };

    let outcome = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, options, &output)
        .run(ReleaseRequest {
            requested_version: Some("0.1.0".to_string()),
            increment: "patch".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.version, Version::new(0, 1, 0));
    assert_eq!(fixture.stored_ledger().unwrap().len(), 1);

    let build = fixture.root.join("build");
    assert!(build.join("firmware.bin").exists());
    assert!(build.join("linux").join("openwrt.bin").exists());
    assert!(build.join("builds.json").exists());
    assert!(build.join(format!("{SHA}.tar.gz")).exists());
}

#[tokio::test]
async fn test_empty_store_without_version_fails() {
    let fixture = Fixture::new(GOOD_BUILD);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);
    let options = PipelineOptions {
        allow_empty_ledger: true,
        ..fixture.options()
    };

    let err = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, options, &output)
        .run(ReleaseRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::Version(VersionError::NoBaseVersion)));
    assert!(fixture.stored_ledger().is_none());
    assert!(!fixture.root.join("build").exists());
}

#[tokio::test]
async fn test_invalid_request_rejected_before_building() {
    let fixture = Fixture::new(GOOD_BUILD);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);

    let err = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output)
        .run(ReleaseRequest {
            requested_version: None,
            increment: "huge".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Version(VersionError::InvalidIncrementKind { .. })
    ));
    assert!(runner.scripts().is_empty());
}

#[tokio::test]
async fn test_failed_build_publishes_nothing() {
    let fixture = Fixture::new(&["printf openwrt > openwrt.bin", "exit 3"]);
    fixture.seed_ledger(vec![record("0.0.1", 1)]);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);

    let err = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output)
        .run(ReleaseRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Remote(RemoteError::ExitFailure { code: 3, .. })
    ));
    assert_eq!(fixture.stored_ledger().unwrap().len(), 1);
    assert!(!fixture.stored_archive().exists());
    // The firmware build never started
    assert!(!runner.scripts().iter().any(|s| s.contains("firmware.bin")));
}

#[tokio::test]
async fn test_duplicate_version_rejected() {
    let fixture = Fixture::new(GOOD_BUILD);
    fixture.seed_ledger(vec![record("2.0.0", 1)]);
    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);

    let err = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output)
        .run(ReleaseRequest {
            requested_version: Some("2.0.0".to_string()),
            increment: "patch".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Version(VersionError::AlreadyReleased { .. })
    ));
    // Nothing was uploaded
    assert!(err.is_recoverable());
    assert!(!fixture.stored_archive().exists());
    assert_eq!(fixture.stored_ledger().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_empty_release_dir_refused() {
    let fixture = Fixture::new(GOOD_BUILD);
    fixture.seed_ledger(vec![record("0.0.1", 1)]);
    let build = fixture.root.join("build");
    std::fs::create_dir_all(&build).unwrap();
    std::fs::write(build.join("stale.bin"), b"old").unwrap();

    let runner = FixedRevisionRunner::new();
    let output = RuntimeConfig::new(false, true);
    let result = ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output)
        .run(ReleaseRequest::default())
        .await;

    assert!(result.is_err());
    // Refused before anything ran on the build machine
    assert!(runner.scripts().is_empty());
    // Operator files are left alone
    assert!(build.join("stale.bin").exists());
}

#[tokio::test]
async fn test_cancelled_run_removes_temporary_folders() {
    let fixture = Fixture::new(GOOD_BUILD);
    fixture.seed_ledger(vec![record("0.0.1", 1)]);
    let runner = StallingRunner::new();
    let output = RuntimeConfig::new(false, true);
    let pipeline =
        ReleasePipeline::new(&runner, &fixture.store, &fixture.config, fixture.options(), &output);

    tokio::select! {
        _ = pipeline.run(ReleaseRequest::default()) => panic!("run finished while downloading"),
        _ = runner.stalled.notified() => {}
    }

    let staged = runner.fetched.lock().unwrap().clone().unwrap();
    let scratch = staged.parent().unwrap();
    assert!(scratch.starts_with("/tmp"));
    assert!(!scratch.exists());
    assert!(!fixture.root.join("build").exists());
    assert!(fixture.stored_ledger().unwrap().len() == 1);
}
