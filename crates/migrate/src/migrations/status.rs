//! Status Reporter - read-only view of the ledger
//!
//! A database that has never been migrated is a normal state here, so an
//! absent ledger table is reported, not raised.

use serde::Serialize;

use super::definitions::{LedgerEntry, MigrationFile};
use super::source::MigrationSource;
use crate::backends::MigrationBackend;
use crate::error::MigrationResult;

/// What the ledger currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entries", rename_all = "snake_case")]
pub enum LedgerStatus {
    /// The ledger table does not exist yet
    Absent,
    /// The table exists but has no rows
    Empty,
    /// Applied migrations, ascending by version
    Applied(Vec<LedgerEntry>),
}

impl LedgerStatus {
    pub fn entries(&self) -> &[LedgerEntry] {
        match self {
            Self::Applied(entries) => entries,
            Self::Absent | Self::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Read the ledger without creating it
pub async fn ledger_status<B>(backend: &mut B) -> MigrationResult<LedgerStatus>
where
    B: MigrationBackend + ?Sized,
{
    if !backend.ledger_exists().await? {
        tracing::debug!("Ledger table does not exist");
        return Ok(LedgerStatus::Absent);
    }

    let entries = backend.list_all().await?;
    if entries.is_empty() {
        Ok(LedgerStatus::Empty)
    } else {
        Ok(LedgerStatus::Applied(entries))
    }
}

/// Files in `source` whose version has no ledger row, in run order
pub fn pending_migrations(
    source: &MigrationSource,
    status: &LedgerStatus,
) -> MigrationResult<Vec<MigrationFile>> {
    let applied = status.entries();
    Ok(source
        .list()?
        .into_iter()
        .filter(|file| !applied.iter().any(|entry| entry.version == file.version))
        .collect())
}
