//! History command implementation.

use super::helpers::{load_config, open_store};
use super::preview::short_sha;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::ledger::{Ledger, LedgerManager};

/// Execute history command
pub(super) async fn execute_history(args: &Args, runtime: &RuntimeConfig) -> Result<()> {
    let Command::History { json, limit } = &args.command else {
        return Ok(());
    };

    let config = load_config(args)?;
    let store = open_store(args, &config, runtime)?;
    let ledger = LedgerManager::new(&store, config.layout().ledger_key(), std::env::temp_dir())
        .load_ledger()
        .await?;

    let shown = limit.unwrap_or(ledger.len());

    if *json {
        let records = ledger.iter().take(shown).cloned().collect();
        let subset = Ledger::from_records(records)?;
        // Machine output ignores --quiet
        println!("{}", String::from_utf8_lossy(&subset.to_json()?));
        return Ok(());
    }

    if ledger.is_empty() {
        runtime.println("No releases published yet");
        return Ok(());
    }

    runtime.section(&format!("Releases ({})", ledger.len()));
    for record in ledger.iter().take(shown) {
        runtime.indent(&format!(
            "{:<12} {}  {}",
            record.version.to_string(),
            short_sha(&record.source_revision),
            record.released_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if shown < ledger.len() {
        runtime.verbose_println(&format!("{} older release(s) not shown", ledger.len() - shown));
    }

    Ok(())
}
