//! Release command execution.
//!
//! Builds on the build machine, versions the artifacts against the ledger and
//! publishes both.

use super::helpers::{build_runner, load_config, open_store};
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{CliError, Result};
use crate::pipeline::{PipelineOptions, ReleasePipeline, ReleaseRequest};

/// Execute release command
pub(super) async fn execute_release(args: &Args, runtime: &RuntimeConfig) -> Result<i32> {
    let Command::Release {
        release_version,
        semver,
        ssh_key,
        release_dir,
        dry_run,
        allow_empty_ledger,
        keep_temp,
    } = &args.command
    else {
        return Ok(1);
    };

    let config = load_config(args)?;
    let store = open_store(args, &config, runtime)?;
    let runner = build_runner(&config, ssh_key.as_deref(), runtime)?;

    let options = PipelineOptions {
        release_dir: release_dir.clone(),
        dry_run: *dry_run,
        allow_empty_ledger: *allow_empty_ledger,
        keep_temp: *keep_temp,
    };
    let request = ReleaseRequest {
        requested_version: release_version.clone(),
        increment: semver.clone(),
    };

    runtime.section("Firmware release");
    let pipeline = ReleasePipeline::new(&runner, &store, &config, options, runtime);

    // Dropping the run on Ctrl-C drops its cleanup guard
    let outcome = tokio::select! {
        outcome = pipeline.run(request) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            return Err(CliError::Interrupted {
                command: args.command.name().to_string(),
            }
            .into());
        }
    };

    runtime.section("Summary");
    runtime.indent(&format!("Version:  {}", outcome.version));
    runtime.indent(&format!("Revision: {}", outcome.source_revision));
    runtime.indent(&format!("Archive:  sha256 {}", outcome.archive.sha256));
    if outcome.published {
        let layout = config.layout();
        runtime.indent(&format!("Ledger:   {}", layout.ledger_key()));
        runtime.indent(&format!(
            "Build:    {}",
            layout.archive_key(&outcome.source_revision)
        ));
    } else {
        runtime.indent("Published: no (dry run)");
    }

    Ok(0)
}
