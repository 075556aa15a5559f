//! Release ledger: the ordered history of published firmware versions.
//!
//! The ledger is read once per run, appended to at most once, and written
//! back to the object store.

mod manager;
mod record;

pub use manager::LedgerManager;
pub use record::{Ledger, ReleaseRecord};
