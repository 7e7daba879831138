//! Migration discovery, execution and reporting

pub mod definitions;
pub mod runner;
pub mod source;
pub mod status;
pub mod validate;

pub use definitions::*;
pub use runner::MigrationRunner;
pub use source::{compute_checksum, extract_version, MigrationSource};
pub use status::{ledger_status, pending_migrations, LedgerStatus};
pub use validate::{validate, Drift, ValidationReport};
