//! Migration Definitions - Core types shared by the source reader, ledger and runner

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::error::{MigrationError, MigrationResult};

/// Table that records applied migrations. Lives in `public` so it exists
/// before any application schema does.
pub const LEDGER_TABLE: &str = "public.schema_migrations";

/// Width of the ledger's `version` column
pub const VERSION_MAX_LEN: usize = 10;

/// A discovered migration file. Content is read on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// Upper-cased version token, e.g. `V001`
    pub version: String,
    /// Full file name, e.g. `V001__create_schema.sql`
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl MigrationFile {
    /// Read the migration's SQL as UTF-8
    pub fn read_content(&self) -> MigrationResult<String> {
        fs::read_to_string(&self.path).map_err(|e| MigrationError::io(&self.path, e))
    }
}

/// One row of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i32,
    pub version: String,
    pub filename: String,
    pub executed_at: Option<NaiveDateTime>,
    pub execution_time_ms: Option<i32>,
    pub checksum: Option<String>,
}

/// What the runner hands to the ledger after a migration succeeds.
/// `id` and `executed_at` are assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub version: String,
    pub filename: String,
    pub execution_time_ms: i32,
    pub checksum: String,
}

/// Result of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of migrations that were applied
    pub applied: usize,
    /// Number of migrations that were skipped (already applied)
    pub skipped: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} applied, {} skipped", self.applied, self.skipped)
    }
}
