//! The release pipeline.
//!
//! A fixed, linear sequence of stages: validate the request, build on the
//! build machine, collect artifacts, version them against the ledger, and
//! publish. Each stage consumes the [`ReleaseContext`] and returns the next
//! one. Temporary directories are owned by a [`CleanupGuard`] that lives for
//! the whole run.

mod archive;
mod context;
mod guard;

pub use archive::{ArchiveInfo, create_archive};
pub use context::{LINUX_DIR, ReleaseContext, ReleaseRequest};
pub use guard::CleanupGuard;

use crate::cli::RuntimeConfig;
use crate::config::FirmwareConfig;
use crate::error::{CliError, Result};
use crate::ledger::{Ledger, LedgerManager, ReleaseRecord};
use crate::remote::{CommandRunner, quote};
use crate::store::{ObjectStore, StoreLayout};
use crate::version::{VersionBump, parse_version, resolve_next_version};
use semver::Version;
use std::path::{Path, PathBuf};

/// Switches that change how a run behaves
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Local folder the artifacts are collected in
    pub release_dir: PathBuf,
    /// Stop before uploading anything
    pub dry_run: bool,
    /// Treat a missing ledger as "no prior releases"
    pub allow_empty_ledger: bool,
    /// Leave temporary directories in place
    pub keep_temp: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            release_dir: PathBuf::from("build"),
            dry_run: false,
            allow_empty_ledger: false,
            keep_temp: false,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    /// Released version
    pub version: Version,
    /// Source revision the release was built from
    pub source_revision: String,
    /// Artifact archive (removed with the release folder unless kept)
    pub archive: ArchiveInfo,
    /// Ledger including this release
    pub ledger: Ledger,
    /// False for dry runs
    pub published: bool,
}

/// Check the request before any long-running work starts.
///
/// An explicit version must parse; otherwise the increment kind must be
/// valid.
pub fn validate_request(ctx: ReleaseContext) -> Result<ReleaseContext> {
    match &ctx.request().requested_version {
        Some(version) => {
            parse_version(version)?;
        }
        None => {
            ctx.request().increment.parse::<VersionBump>()?;
        }
    }
    Ok(ctx)
}

/// Runs one release from start to finish
pub struct ReleasePipeline<'a, R: CommandRunner, S: ObjectStore> {
    runner: &'a R,
    store: &'a S,
    config: &'a FirmwareConfig,
    options: PipelineOptions,
    output: &'a RuntimeConfig,
}

impl<'a, R: CommandRunner, S: ObjectStore> ReleasePipeline<'a, R, S> {
    /// Assemble a pipeline
    pub fn new(
        runner: &'a R,
        store: &'a S,
        config: &'a FirmwareConfig,
        options: PipelineOptions,
        output: &'a RuntimeConfig,
    ) -> Self {
        Self {
            runner,
            store,
            config,
            options,
            output,
        }
    }

    fn layout(&self) -> StoreLayout {
        self.config.layout()
    }

    fn ledger_manager(&self, staging_dir: &Path) -> LedgerManager<'a, S> {
        LedgerManager::new(self.store, self.layout().ledger_key(), staging_dir)
            .allow_missing(self.options.allow_empty_ledger)
    }

    /// Execute every stage in order.
    ///
    /// The first failure aborts the run; temporary directories are removed
    /// either way.
    pub async fn run(&self, request: ReleaseRequest) -> Result<ReleaseOutcome> {
        let mut guard = CleanupGuard::new(self.options.keep_temp);

        let ctx = validate_request(ReleaseContext::new(request))?;
        self.check_release_dir().await?;
        let ctx = self.connect(ctx).await?;
        let ctx = self.fetch_source_revision(ctx).await?;
        let ctx = self.build_openwrt(ctx).await?;
        let ctx = self.build_firmware(ctx).await?;
        let ctx = self.prepare_release_dir(ctx, &mut guard).await?;
        let ctx = self.download_fresh_builds(ctx, &mut guard).await?;
        let ctx = self.load_ledger(ctx).await?;
        let ctx = self.set_release_version(ctx)?;
        let ctx = self.archive_builds(ctx).await?;
        let ctx = self.record_release(ctx)?;
        let published = self.publish(&ctx).await?;

        Ok(ReleaseOutcome {
            version: ctx.release_version()?.clone(),
            source_revision: ctx.source_revision()?.to_string(),
            archive: ctx.archive()?.clone(),
            ledger: ctx.updated_ledger()?.clone(),
            published,
        })
    }

    /// Bring the build machine up
    pub async fn connect(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        self.output
            .progress_println(&format!("Connecting to build machine ({})...", self.runner.name()));
        self.runner.connect().await?;
        log::info!("Build machine ready");
        Ok(ctx)
    }

    /// Read the OpenWrt HEAD commit
    pub async fn fetch_source_revision(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        let script = format!(
            "cd {} && git rev-parse --verify HEAD",
            quote(&self.config.build.openwrt_dir)
        );
        let sha = self.runner.execute(&script).await?;
        let sha = sha.lines().last().unwrap_or_default().trim().to_string();

        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CliError::ExecutionFailed {
                command: script,
                reason: format!("unexpected revision '{sha}'"),
            }
            .into());
        }

        log::info!("Releasing source revision {sha}");
        self.output.verbose_println(&format!("Source revision: {sha}"));
        Ok(ctx.with_source_revision(sha))
    }

    /// Build the OpenWrt tree
    pub async fn build_openwrt(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        self.output.progress_println("Building OpenWrt...");
        self.run_in(&self.config.build.openwrt_dir, &self.config.build.openwrt_commands)
            .await?;
        Ok(ctx)
    }

    /// Build the firmware tree
    pub async fn build_firmware(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        self.output.progress_println("Building firmware...");
        self.run_in(&self.config.build.firmware_dir, &self.config.build.firmware_commands)
            .await?;
        Ok(ctx)
    }

    // Commands are chained with `;`: earlier passes may fail, the last one decides.
    async fn run_in(&self, dir: &str, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let script = format!("cd {} && {{ {}; }}", quote(dir), commands.join("; "));
        self.runner.execute(&script).await?;
        log::info!("Build in {} finished", dir);
        Ok(())
    }

    /// Fail unless the release folder is absent or empty
    pub async fn check_release_dir(&self) -> Result<()> {
        let dir = &self.options.release_dir;

        if dir.exists() {
            let mut entries = tokio::fs::read_dir(dir).await?;
            if entries.next_entry().await?.is_some() {
                return Err(CliError::InvalidArguments {
                    reason: format!(
                        "release folder {} is not empty; remove it or pass --release-dir",
                        dir.display()
                    ),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Create the local release folder and its `linux/` subfolder
    pub async fn prepare_release_dir(
        &self,
        ctx: ReleaseContext,
        guard: &mut CleanupGuard,
    ) -> Result<ReleaseContext> {
        self.check_release_dir().await?;

        let dir = &self.options.release_dir;
        tokio::fs::create_dir_all(dir.join(LINUX_DIR)).await?;
        let dir = tokio::fs::canonicalize(dir).await?;
        guard.track_local(&dir);

        self.output
            .verbose_println(&format!("Release folder: {}", dir.display()));
        Ok(ctx.with_release_dir(dir))
    }

    /// Snapshot the artifacts on the build machine and copy them locally
    pub async fn download_fresh_builds(
        &self,
        ctx: ReleaseContext,
        guard: &mut CleanupGuard,
    ) -> Result<ReleaseContext> {
        if self.config.artifacts.is_empty() {
            return Ok(ctx);
        }
        self.output.progress_println("Retrieving build artifacts...");

        let staging = format!("/tmp/firmware-release-{}", uuid::Uuid::new_v4().simple());
        guard.track_remote(self.runner, &staging);

        let staged: Vec<String> = self
            .config
            .artifacts
            .iter()
            .enumerate()
            .map(|(i, artifact)| {
                let name = artifact
                    .local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "artifact".to_string());
                format!("{staging}/{i}-{name}")
            })
            .collect();

        let copies: Vec<String> = self
            .config
            .artifacts
            .iter()
            .zip(&staged)
            .map(|(artifact, staged)| format!("cp {} {}", quote(&artifact.remote), quote(staged)))
            .collect();
        let script = format!("mkdir -p {} && {}", quote(&staging), copies.join(" && "));
        self.runner.execute(&script).await?;

        let release_dir = ctx.release_dir()?.to_path_buf();
        for (artifact, staged) in self.config.artifacts.iter().zip(&staged) {
            let local = release_dir.join(&artifact.local);
            self.runner.fetch_file(staged, &local).await?;
            self.output
                .verbose_println(&format!("Retrieved {}", artifact.local.display()));
        }

        Ok(ctx)
    }

    /// Fetch the ledger snapshot
    pub async fn load_ledger(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        let ledger = self.ledger_manager(ctx.release_dir()?).load_ledger().await?;
        if let Some(latest) = ledger.latest() {
            self.output
                .verbose_println(&format!("Latest release: {}", latest.version));
        }
        Ok(ctx.with_ledger(ledger))
    }

    /// Decide the release version
    pub fn set_release_version(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        let request = ctx.request();
        let version = resolve_next_version(
            ctx.ledger()?,
            request.requested_version.as_deref(),
            &request.increment,
        )?;

        log::info!("Resolved release version {version}");
        self.output
            .success_println(&format!("New version will be released as {version}"));
        Ok(ctx.with_release_version(version))
    }

    /// Pack `linux/` into `<sha>.tar.gz`
    pub async fn archive_builds(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        let info = create_archive(&ctx.linux_dir()?, &ctx.archive_path()?).await?;
        self.output.verbose_println(&format!(
            "Archive {} ({} bytes, sha256 {})",
            info.path.display(),
            info.size_bytes,
            info.sha256
        ));
        Ok(ctx.with_archive(info))
    }

    /// Prepend this release to the ledger snapshot
    pub fn record_release(&self, ctx: ReleaseContext) -> Result<ReleaseContext> {
        let record = ReleaseRecord::new(ctx.release_version()?.clone(), ctx.source_revision()?);
        let updated = ctx.ledger()?.append_release(record)?;
        Ok(ctx.with_updated_ledger(updated))
    }

    /// Upload the archive, then the ledger naming it.
    ///
    /// Returns false for dry runs, which only stage the ledger locally.
    pub async fn publish(&self, ctx: &ReleaseContext) -> Result<bool> {
        let manager = self.ledger_manager(ctx.release_dir()?);
        let ledger = ctx.updated_ledger()?;

        if self.options.dry_run {
            let staged = manager.stage(ledger).await?;
            self.output.warning_println("Dry run: nothing was uploaded");
            if self.options.keep_temp {
                self.output
                    .verbose_println(&format!("Ledger staged at {}", staged.display()));
            }
            self.output
                .println(&String::from_utf8_lossy(&ledger.to_json()?));
            return Ok(false);
        }

        let archive_key = self.layout().archive_key(ctx.source_revision()?);
        self.output
            .progress_println(&format!("Uploading build to {archive_key}..."));
        self.store.store(&archive_key, &ctx.archive()?.path).await?;
        log::info!("Uploaded archive to {archive_key}");

        self.output
            .progress_println(&format!("Updating ledger {}...", manager.location()));
        manager.publish_ledger(ledger).await?;

        self.output.success_println("Done!");
        Ok(true)
    }
}
