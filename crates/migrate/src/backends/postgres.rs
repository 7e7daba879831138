//! PostgreSQL Ledger Backend
//!
//! Ledger reads and writes go through sqlx with bound parameters. Migration
//! SQL is sent unprepared so a file may hold several statements.

use async_trait::async_trait;
use digest_core::DatabaseConfig;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Executor, Row};

use super::core::MigrationBackend;
use crate::connection;
use crate::error::{MigrationError, MigrationResult};
use crate::migrations::definitions::{LedgerEntry, NewLedgerEntry};

const UNIQUE_VIOLATION: &str = "23505";

const CREATE_LEDGER_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS public.schema_migrations (
    id SERIAL PRIMARY KEY,
    version VARCHAR(10) NOT NULL UNIQUE,
    filename VARCHAR(255) NOT NULL,
    executed_at TIMESTAMP DEFAULT NOW(),
    execution_time_ms INTEGER,
    checksum TEXT
)"#;

const LEDGER_EXISTS_SQL: &str = "SELECT to_regclass('public.schema_migrations') IS NOT NULL";

const LOOKUP_SQL: &str = "SELECT id, version, filename, executed_at, execution_time_ms, checksum \
     FROM public.schema_migrations WHERE version = $1 LIMIT 1";

const RECORD_SQL: &str = "INSERT INTO public.schema_migrations \
     (version, filename, execution_time_ms, checksum) VALUES ($1, $2, $3, $4)";

const LIST_SQL: &str = "SELECT id, version, filename, executed_at, execution_time_ms, checksum \
     FROM public.schema_migrations ORDER BY version ASC";

/// Backend over one dedicated `PgConnection`
#[derive(Debug)]
pub struct PostgresBackend {
    conn: Option<PgConnection>,
}

impl PostgresBackend {
    pub async fn connect(config: &DatabaseConfig) -> MigrationResult<Self> {
        let conn = connection::connect(config).await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }

    pub fn is_released(&self) -> bool {
        self.conn.is_none()
    }

    fn conn(&mut self) -> MigrationResult<&mut PgConnection> {
        self.conn.as_mut().ok_or(MigrationError::ConnectionReleased)
    }
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, sqlx::Error> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        filename: row.try_get("filename")?,
        executed_at: row.try_get("executed_at")?,
        execution_time_ms: row.try_get("execution_time_ms")?,
        checksum: row.try_get("checksum")?,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl MigrationBackend for PostgresBackend {
    async fn ensure_ledger(&mut self) -> MigrationResult<()> {
        let conn = self.conn()?;
        conn.execute(CREATE_LEDGER_SQL)
            .await
            .map_err(|e| MigrationError::ledger("create", e))?;
        tracing::debug!("Ledger table ensured");
        Ok(())
    }

    async fn ledger_exists(&mut self) -> MigrationResult<bool> {
        let conn = self.conn()?;
        sqlx::query_scalar::<_, bool>(LEDGER_EXISTS_SQL)
            .fetch_one(conn)
            .await
            .map_err(|e| MigrationError::ledger("existence check", e))
    }

    async fn lookup(&mut self, version: &str) -> MigrationResult<Option<LedgerEntry>> {
        let conn = self.conn()?;
        let row = sqlx::query(LOOKUP_SQL)
            .bind(version)
            .fetch_optional(conn)
            .await
            .map_err(|e| MigrationError::ledger("lookup", e))?;

        row.as_ref()
            .map(entry_from_row)
            .transpose()
            .map_err(|e| MigrationError::ledger("lookup", e))
    }

    async fn record(&mut self, entry: &NewLedgerEntry) -> MigrationResult<()> {
        let conn = self.conn()?;
        sqlx::query(RECORD_SQL)
            .bind(&entry.version)
            .bind(&entry.filename)
            .bind(entry.execution_time_ms)
            .bind(&entry.checksum)
            .execute(conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MigrationError::DuplicateVersion {
                        version: entry.version.clone(),
                    }
                } else {
                    MigrationError::ledger("record", e)
                }
            })?;
        Ok(())
    }

    async fn list_all(&mut self) -> MigrationResult<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let rows = sqlx::query(LIST_SQL)
            .fetch_all(conn)
            .await
            .map_err(|e| MigrationError::ledger("list", e))?;

        rows.iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MigrationError::ledger("list", e))
    }

    async fn apply(&mut self, sql: &str) -> MigrationResult<()> {
        let conn = self.conn()?;
        conn.execute(sql).await.map_err(MigrationError::Statement)?;
        Ok(())
    }

    async fn close(&mut self) -> MigrationResult<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close()
                    .await
                    .map_err(|e| MigrationError::ledger("close", e))?;
                tracing::debug!("Database connection released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
