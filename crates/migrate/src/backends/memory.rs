//! In-process ledger backend
//!
//! Mirrors the PostgreSQL backend's contract: lookups before the ledger
//! exists fail, duplicate versions are rejected, and `close` is idempotent.
//! Clones share state, so a test can keep a handle and inspect the ledger
//! after the runner has consumed its own copy.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};

use super::core::MigrationBackend;
use crate::error::{MigrationError, MigrationResult};
use crate::migrations::definitions::{LedgerEntry, NewLedgerEntry};

/// Everything the memory backend has seen
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub ledger_created: bool,
    pub entries: Vec<LedgerEntry>,
    /// SQL passed to `apply`, in order, including statements that failed
    pub applied_sql: Vec<String>,
    /// Number of times `close` actually released the connection
    pub close_count: usize,
    next_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    fail_when: Option<String>,
    fail_record: Option<String>,
    released: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `apply` fail for any SQL containing `needle`
    pub fn with_failure(mut self, needle: impl Into<String>) -> Self {
        self.fail_when = Some(needle.into());
        self
    }

    /// Make `record` fail with a ledger error for `version`
    pub fn with_record_failure(mut self, version: impl Into<String>) -> Self {
        self.fail_record = Some(version.into());
        self
    }

    /// Pre-populate the ledger as if an earlier run had recorded `entry`
    pub fn with_entry(self, entry: NewLedgerEntry) -> Self {
        {
            let mut state = self.lock();
            state.ledger_created = true;
            push_entry(&mut state, &entry);
        }
        self
    }

    /// Insert a row exactly as given, e.g. one written by an older tool
    /// without a checksum
    pub fn with_row(self, row: LedgerEntry) -> Self {
        {
            let mut state = self.lock();
            state.ledger_created = true;
            state.next_id = state.next_id.max(row.id);
            state.entries.push(row);
        }
        self
    }

    /// Ledger table exists but holds no rows
    pub fn with_empty_ledger(self) -> Self {
        self.lock().ledger_created = true;
        self
    }

    pub fn snapshot(&self) -> MemoryState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_open(&self) -> MigrationResult<()> {
        if self.released {
            Err(MigrationError::ConnectionReleased)
        } else {
            Ok(())
        }
    }

    fn check_ledger(&self, state: &MemoryState, operation: &'static str) -> MigrationResult<()> {
        if state.ledger_created {
            Ok(())
        } else {
            Err(MigrationError::ledger(
                operation,
                sqlx::Error::Protocol("relation \"public.schema_migrations\" does not exist".to_string()),
            ))
        }
    }
}

fn push_entry(state: &mut MemoryState, entry: &NewLedgerEntry) {
    state.next_id += 1;
    state.entries.push(LedgerEntry {
        id: state.next_id,
        version: entry.version.clone(),
        filename: entry.filename.clone(),
        executed_at: Some(Utc::now().naive_utc()),
        execution_time_ms: Some(entry.execution_time_ms),
        checksum: Some(entry.checksum.clone()),
    });
}

#[async_trait]
impl MigrationBackend for MemoryBackend {
    async fn ensure_ledger(&mut self) -> MigrationResult<()> {
        self.check_open()?;
        self.lock().ledger_created = true;
        Ok(())
    }

    async fn ledger_exists(&mut self) -> MigrationResult<bool> {
        self.check_open()?;
        Ok(self.lock().ledger_created)
    }

    async fn lookup(&mut self, version: &str) -> MigrationResult<Option<LedgerEntry>> {
        self.check_open()?;
        let state = self.lock();
        self.check_ledger(&state, "lookup")?;
        Ok(state.entries.iter().find(|e| e.version == version).cloned())
    }

    async fn record(&mut self, entry: &NewLedgerEntry) -> MigrationResult<()> {
        self.check_open()?;
        let mut state = self.lock();
        self.check_ledger(&state, "record")?;
        if self.fail_record.as_deref() == Some(entry.version.as_str()) {
            return Err(MigrationError::ledger(
                "record",
                sqlx::Error::Protocol("connection reset by peer".to_string()),
            ));
        }
        if state.entries.iter().any(|e| e.version == entry.version) {
            return Err(MigrationError::DuplicateVersion {
                version: entry.version.clone(),
            });
        }
        push_entry(&mut state, entry);
        Ok(())
    }

    async fn list_all(&mut self) -> MigrationResult<Vec<LedgerEntry>> {
        self.check_open()?;
        let state = self.lock();
        self.check_ledger(&state, "list")?;
        let mut entries = state.entries.clone();
        entries.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(entries)
    }

    async fn apply(&mut self, sql: &str) -> MigrationResult<()> {
        self.check_open()?;
        self.lock().applied_sql.push(sql.to_string());

        match &self.fail_when {
            Some(needle) if sql.contains(needle.as_str()) => Err(MigrationError::Statement(
                sqlx::Error::Protocol(format!("syntax error at or near \"{}\"", needle)),
            )),
            _ => Ok(()),
        }
    }

    async fn close(&mut self) -> MigrationResult<()> {
        if !self.released {
            self.released = true;
            self.lock().close_count += 1;
        }
        Ok(())
    }
}
