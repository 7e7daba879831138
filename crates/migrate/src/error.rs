//! Error types for the migration engine
//!
//! Every failure is fatal for the run that hits it. Variants carry enough
//! context (file, version, checksum) for the operator to find the culprit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database could not be reached
    #[error("Failed to connect to PostgreSQL at {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// A file in the migrations directory breaks the naming contract
    #[error("Invalid migration filename format: {filename} ({reason})")]
    InvalidFilename { filename: String, reason: String },

    /// An applied migration was edited after it ran
    #[error(
        "Checksum mismatch for {filename}. Previously applied as {prior_filename} with checksum \
         {prior_checksum}, current checksum is {current_checksum}."
    )]
    ChecksumMismatch {
        filename: String,
        prior_filename: String,
        prior_checksum: String,
        current_checksum: String,
    },

    /// The database rejected a migration; nothing was recorded for it
    #[error("Migration {filename} failed: {source}")]
    Execution {
        filename: String,
        #[source]
        source: Box<MigrationError>,
    },

    /// A statement sent by `apply` failed
    #[error("Statement rejected by the database: {0}")]
    Statement(#[source] sqlx::Error),

    /// The ledger already holds this version
    #[error("Migration version {version} is already recorded in the ledger")]
    DuplicateVersion { version: String },

    /// A ledger read or write failed
    #[error("Ledger {operation} failed: {source}")]
    Ledger {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migrations directory not found: {}", .path.display())]
    MissingDirectory { path: PathBuf },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend already gave its connection back
    #[error("Database connection has already been released")]
    ConnectionReleased,
}

impl MigrationError {
    pub fn invalid_filename(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn ledger(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Ledger { operation, source }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Migration file this error is about, if any
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::InvalidFilename { filename, .. }
            | Self::ChecksumMismatch { filename, .. }
            | Self::Execution { filename, .. } => Some(filename),
            _ => None,
        }
    }
}
