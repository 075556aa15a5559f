//! Preview command implementation.
//!
//! Shows the version the next release would get without building anything.

use super::helpers::{load_config, open_store};
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::ledger::LedgerManager;
use crate::version::resolve_next_version;

/// Execute preview command
pub(super) async fn execute_preview(args: &Args, runtime: &RuntimeConfig) -> Result<()> {
    let Command::Preview {
        release_version,
        semver,
        allow_empty_ledger,
    } = &args.command
    else {
        return Ok(());
    };

    let config = load_config(args)?;
    let store = open_store(args, &config, runtime)?;

    runtime.verbose_println("Loading release ledger...");
    // Loading never stages anything
    let ledger = LedgerManager::new(&store, config.layout().ledger_key(), std::env::temp_dir())
        .allow_missing(*allow_empty_ledger)
        .load_ledger()
        .await?;

    let next = resolve_next_version(&ledger, release_version.as_deref(), semver)?;

    match ledger.latest() {
        Some(latest) => runtime.println(&format!(
            "{} -> {} (released {} from {})",
            latest.version,
            next,
            latest.released_at.format("%Y-%m-%d"),
            short_sha(&latest.source_revision)
        )),
        None => runtime.println(&format!("(no releases) -> {next}")),
    }

    Ok(())
}

/// First seven characters of a revision
pub(super) fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
