//! Command execution functions.
//!
//! Validates arguments, dispatches to the command and turns failures into
//! an exit code with recovery suggestions.

mod helpers;
mod history;
mod preview;
mod release;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{ReleaseError, Result};

use history::execute_history;
use preview::execute_preview;
use release::execute_release;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Never quiet for validation errors
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Release { .. } => execute_release(&args, &config).await,
        Command::Preview { .. } => execute_preview(&args, &config).await.map(|()| 0),
        Command::History { .. } => execute_history(&args, &config).await.map(|()| 0),
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            report_failure(&args, &config, &e);
            Ok(1)
        }
    }
}

fn report_failure(args: &Args, config: &RuntimeConfig, error: &ReleaseError) {
    config.error_println(&format!(
        "Command '{}' failed: {}",
        args.command.name(),
        error
    ));

    if !error.is_recoverable() {
        config.error_println("The remote state may be partially updated; check it before retrying");
    }

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() && !config.is_quiet() {
        config.println("\nRecovery suggestions:");
        for suggestion in suggestions {
            config.println(&format!("  • {}", suggestion));
        }
    }
}
