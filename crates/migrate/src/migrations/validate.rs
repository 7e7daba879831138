//! Read-only comparison of the migrations directory against the ledger
//!
//! Answers "would a run succeed, and what would it do" without executing
//! anything or creating the ledger table.

use serde::Serialize;

use super::definitions::{LedgerEntry, MigrationFile};
use super::source::{compute_checksum, MigrationSource};
use super::status::ledger_status;
use crate::backends::MigrationBackend;
use crate::error::MigrationResult;

/// A file whose content no longer matches its recorded checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub version: String,
    pub filename: String,
    pub prior_filename: String,
    pub prior_checksum: String,
    pub current_checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Applied, content unchanged (or no checksum recorded)
    pub verified: Vec<MigrationFile>,
    /// Not applied yet
    pub pending: Vec<MigrationFile>,
    pub drifted: Vec<Drift>,
    /// Ledger rows with no file on disk
    pub orphaned: Vec<LedgerEntry>,
}

impl ValidationReport {
    /// Whether a run would get past every applied migration
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty()
    }
}

/// Compare every file against the ledger.
///
/// Unlike a run, every drifted file is reported rather than just the first.
pub async fn validate<B>(backend: &mut B, source: &MigrationSource) -> MigrationResult<ValidationReport>
where
    B: MigrationBackend + ?Sized,
{
    let status = ledger_status(backend).await?;
    let files = source.list()?;
    let entries = status.entries();

    let mut report = ValidationReport::default();
    for file in &files {
        let Some(entry) = entries.iter().find(|e| e.version == file.version) else {
            report.pending.push(file.clone());
            continue;
        };

        let current_checksum = compute_checksum(&file.read_content()?);
        match &entry.checksum {
            Some(prior) if *prior != current_checksum => {
                tracing::warn!(
                    version = %file.version,
                    filename = %file.filename,
                    "Applied migration has changed on disk"
                );
                report.drifted.push(Drift {
                    version: file.version.clone(),
                    filename: file.filename.clone(),
                    prior_filename: entry.filename.clone(),
                    prior_checksum: prior.clone(),
                    current_checksum,
                });
            }
            _ => report.verified.push(file.clone()),
        }
    }

    report.orphaned = entries
        .iter()
        .filter(|entry| !files.iter().any(|f| f.version == entry.version))
        .cloned()
        .collect();

    Ok(report)
}
