//! # Firmware Release
//!
//! Builds, versions and publishes Tessel 2 firmware.
//!
//! A release builds OpenWrt and the firmware on a build machine, retrieves
//! the images, assigns the next semantic version from the release ledger
//! (`builds.json`) and uploads the image archive and the updated ledger to
//! object storage.
//!
//! ## Usage
//!
//! ```bash
//! firmware_release release                    # next patch version
//! firmware_release release --semver minor     # next minor version
//! firmware_release release -v 1.0.0 --dry-run # explicit version, no upload
//! firmware_release history                    # list releases
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod remote;
pub mod store;
pub mod version;

pub use cli::Args;
pub use config::FirmwareConfig;
pub use error::{ReleaseError, Result};
pub use ledger::{Ledger, LedgerManager, ReleaseRecord};
pub use pipeline::{PipelineOptions, ReleaseOutcome, ReleasePipeline, ReleaseRequest};
pub use remote::{CommandRunner, RemoteRunner};
pub use store::{ObjectKey, ObjectStore, Store, StoreLayout};
pub use version::{VersionBump, resolve_next_version};
