//! Migration Runner - applies pending migrations in file order
//!
//! Each file is looked up in the ledger by version. Recorded versions are
//! checked for drift and skipped; the rest are executed and recorded. The
//! first failure of any kind ends the run.

use std::time::Instant;

use super::definitions::{MigrationFile, NewLedgerEntry, RunSummary};
use super::source::{compute_checksum, MigrationSource};
use crate::backends::{release, MigrationBackend};
use crate::error::{MigrationError, MigrationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Skipped,
}

/// Runs the migrations of one source against one backend
pub struct MigrationRunner<B: MigrationBackend> {
    backend: B,
    source: MigrationSource,
    current: Option<String>,
}

impl<B: MigrationBackend> MigrationRunner<B> {
    pub fn new(backend: B, source: MigrationSource) -> Self {
        Self {
            backend,
            source,
            current: None,
        }
    }

    /// File being processed when the last `run_pending` stopped, if it
    /// stopped inside the file loop
    pub fn current_migration(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Apply every pending migration, then release the connection.
    ///
    /// The connection is released exactly once whether the run succeeds or
    /// fails, and a failure to release never replaces the run's own error.
    pub async fn run(mut self) -> MigrationResult<RunSummary> {
        let result = self.run_pending().await;
        release(&mut self.backend).await;

        match &result {
            Ok(summary) => tracing::info!(
                applied = summary.applied,
                skipped = summary.skipped,
                "Migrations completed: {}",
                summary
            ),
            Err(e) => tracing::error!(
                migration = self
                    .current_migration()
                    .or_else(|| e.filename())
                    .unwrap_or("before processing migration files"),
                error = %e,
                "Migration run failed"
            ),
        }

        result
    }

    /// Apply every pending migration, leaving the connection open.
    pub async fn run_pending(&mut self) -> MigrationResult<RunSummary> {
        self.current = None;
        self.backend.ensure_ledger().await?;

        let migrations = self.source.list()?;
        tracing::info!(
            count = migrations.len(),
            dir = %self.source.dir().display(),
            "Found migration files"
        );

        tracing::info!("Checking migration history");
        let mut summary = RunSummary::default();
        for migration in &migrations {
            self.current = Some(migration.filename.clone());
            match self.process(migration).await? {
                Outcome::Applied => summary.applied += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        self.current = None;

        Ok(summary)
    }

    async fn process(&mut self, migration: &MigrationFile) -> MigrationResult<Outcome> {
        let content = migration.read_content()?;
        let checksum = compute_checksum(&content);

        if let Some(existing) = self.backend.lookup(&migration.version).await? {
            if let Some(prior_checksum) = existing.checksum {
                if prior_checksum != checksum {
                    return Err(MigrationError::ChecksumMismatch {
                        filename: migration.filename.clone(),
                        prior_filename: existing.filename,
                        prior_checksum,
                        current_checksum: checksum,
                    });
                }
            }

            tracing::info!(version = %migration.version, "Skipping (already applied)");
            return Ok(Outcome::Skipped);
        }

        tracing::info!(
            version = %migration.version,
            migration = %migration.filename,
            "Running migration"
        );

        let started = Instant::now();
        self.backend
            .apply(&content)
            .await
            .map_err(|e| MigrationError::Execution {
                filename: migration.filename.clone(),
                source: Box::new(e),
            })?;
        let execution_time_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

        self.backend
            .record(&NewLedgerEntry {
                version: migration.version.clone(),
                filename: migration.filename.clone(),
                execution_time_ms,
                checksum,
            })
            .await?;

        tracing::info!(
            migration = %migration.filename,
            execution_time_ms,
            "Applied migration"
        );

        Ok(Outcome::Applied)
    }
}
