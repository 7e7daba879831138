//! Core Ledger Backend Trait
//!
//! The runner, status reporter and validator only talk to the database
//! through `MigrationBackend`. A backend owns exactly one connection and
//! gives it back through `close`.

use async_trait::async_trait;

use crate::error::MigrationResult;
use crate::migrations::definitions::{LedgerEntry, NewLedgerEntry};

/// Ledger access plus SQL execution over a single connection
#[async_trait]
pub trait MigrationBackend: Send {
    /// Create the ledger table if it is missing. Idempotent.
    async fn ensure_ledger(&mut self) -> MigrationResult<()>;

    /// Whether the ledger table exists. Never creates it.
    async fn ledger_exists(&mut self) -> MigrationResult<bool>;

    /// Ledger row for a version, if one was recorded
    async fn lookup(&mut self, version: &str) -> MigrationResult<Option<LedgerEntry>>;

    /// Append a row. Fails with `DuplicateVersion` if the version is taken.
    async fn record(&mut self, entry: &NewLedgerEntry) -> MigrationResult<()>;

    /// All rows, ascending by version
    async fn list_all(&mut self) -> MigrationResult<Vec<LedgerEntry>>;

    /// Send a migration's SQL as one multi-statement request.
    ///
    /// PostgreSQL runs such a request as a single implicit transaction unless
    /// the file issues its own `BEGIN`/`COMMIT`.
    async fn apply(&mut self, sql: &str) -> MigrationResult<()>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self) -> MigrationResult<()>;
}

/// Close the backend, logging instead of failing.
///
/// Used on every exit path so a close failure never hides the error that
/// ended the run.
pub async fn release<B>(backend: &mut B)
where
    B: MigrationBackend + ?Sized,
{
    if let Err(e) = backend.close().await {
        tracing::warn!(error = %e, "Failed to release database connection");
    }
}
