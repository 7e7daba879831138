//! # digest-migrate
//!
//! Applies versioned SQL migrations to PostgreSQL exactly once, in file
//! order, and refuses to continue when an applied file has been edited.
//!
//! Applied versions are recorded in `public.schema_migrations` together with
//! a SHA-256 checksum of the file content and the execution time.
//!
//! ```no_run
//! use digest_core::DatabaseConfig;
//! use std::path::Path;
//!
//! # async fn demo() -> digest_migrate::MigrationResult<()> {
//! let config = DatabaseConfig::from_env().expect("valid environment");
//! let summary = digest_migrate::run_migrations(&config, Path::new("database/migrations")).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod connection;
pub mod error;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub use backends::MemoryBackend;
pub use backends::{MigrationBackend, PostgresBackend};
pub use error::{MigrationError, MigrationResult};
pub use migrations::{
    LedgerEntry, LedgerStatus, MigrationFile, MigrationRunner, MigrationSource, RunSummary,
    ValidationReport, LEDGER_TABLE,
};

use digest_core::DatabaseConfig;
use std::path::Path;

/// Connect, apply every pending migration in `dir`, and disconnect.
pub async fn run_migrations(config: &DatabaseConfig, dir: &Path) -> MigrationResult<RunSummary> {
    let backend = PostgresBackend::connect(config).await?;
    MigrationRunner::new(backend, MigrationSource::new(dir)).run().await
}

/// Connect, read the ledger, and disconnect.
pub async fn show_status(config: &DatabaseConfig) -> MigrationResult<LedgerStatus> {
    let mut backend = PostgresBackend::connect(config).await?;
    let result = migrations::ledger_status(&mut backend).await;
    backends::release(&mut backend).await;
    result
}

/// Connect, compare `dir` with the ledger, and disconnect. Executes nothing.
pub async fn validate_migrations(
    config: &DatabaseConfig,
    dir: &Path,
) -> MigrationResult<ValidationReport> {
    let mut backend = PostgresBackend::connect(config).await?;
    let result = migrations::validate(&mut backend, &MigrationSource::new(dir)).await;
    backends::release(&mut backend).await;
    result
}
