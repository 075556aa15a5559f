//! Command line argument parsing and validation.

use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build, version and publish Tessel 2 firmware
#[derive(Parser, Debug)]
#[command(
    name = "firmware_release",
    version,
    about = "Build, version and publish firmware releases",
    long_about = "Builds OpenWrt and the firmware on the build machine, retrieves the images,
assigns the next semantic version from the release ledger and uploads everything
to the builds bucket.

Usage:
  firmware_release release                     # next patch version
  firmware_release release --semver minor
  firmware_release release --release-version 1.0.0
  firmware_release preview
  firmware_release history --json"
)]
pub struct Args {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Path to JSON file containing AWS credentials and build settings
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Use a directory as the bucket root instead of S3
    #[arg(long, global = true, value_name = "DIR", env = "FIRMWARE_RELEASE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Show extra detail
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build and publish a new release
    Release {
        /// Semver release version, overriding the increment
        #[arg(short = 'v', long, value_name = "SEMVER")]
        release_version: Option<String>,

        /// Type of semver increment to apply (major, minor, patch)
        #[arg(short = 's', long, default_value = "patch")]
        semver: String,

        /// SSH key for the build machine
        #[arg(short = 'i', long, value_name = "PATH")]
        ssh_key: Option<String>,

        /// Local folder the artifacts are collected in
        #[arg(long, default_value = "build")]
        release_dir: PathBuf,

        /// Build and version, but upload nothing
        #[arg(long)]
        dry_run: bool,

        /// Start from an empty ledger when none is stored yet
        #[arg(long)]
        allow_empty_ledger: bool,

        /// Keep the release folder and remote scratch files
        #[arg(long)]
        keep_temp: bool,
    },

    /// Show the version the next release would get
    Preview {
        /// Semver release version, overriding the increment
        #[arg(short = 'v', long, value_name = "SEMVER")]
        release_version: Option<String>,

        /// Type of semver increment to apply (major, minor, patch)
        #[arg(short = 's', long, default_value = "patch")]
        semver: String,

        /// Start from an empty ledger when none is stored yet
        #[arg(long)]
        allow_empty_ledger: bool,
    },

    /// List published releases
    History {
        /// Print the ledger as JSON
        #[arg(long)]
        json: bool,

        /// Show at most this many releases
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Release { .. } => "release",
            Command::Preview { .. } => "preview",
            Command::History { .. } => "history",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Release {
                release_version,
                release_dir,
                ..
            } => {
                if release_version.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    return Err("--release-version must not be empty".to_string());
                }
                if release_dir.as_os_str().is_empty() {
                    return Err("--release-dir must not be empty".to_string());
                }
            }
            Command::History { limit: Some(0), .. } => {
                return Err("--limit must be at least 1".to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Print message
    pub fn println(&self, message: &str) {
        self.output.println(message);
    }

    /// Print verbose message
    pub fn verbose_println(&self, message: &str) {
        self.output.verbose(message);
    }

    /// Print progress message
    pub fn progress_println(&self, message: &str) {
        self.output.progress(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        self.output.success(message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        self.output.section(title);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        self.output.indent(message);
    }

    /// Check if output is suppressed
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet)
    }
}
