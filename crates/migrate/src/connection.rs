//! PostgreSQL connection setup
//!
//! One plain connection per invocation, no pool. With `ssl` set the session
//! is encrypted but the server certificate is not verified.

use digest_core::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;

use crate::error::{MigrationError, MigrationResult};

const APPLICATION_NAME: &str = "digest-migrate";

/// `Require` encrypts without checking the certificate chain
pub fn ssl_mode(config: &DatabaseConfig) -> PgSslMode {
    if config.ssl {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    }
}

pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .ssl_mode(ssl_mode(config))
        .application_name(APPLICATION_NAME);

    match &config.password {
        Some(password) => options.password(password),
        None => options,
    }
}

/// Open a single connection to the configured database
pub async fn connect(config: &DatabaseConfig) -> MigrationResult<PgConnection> {
    let target = config.target();
    tracing::info!(target_db = %target, ssl = config.ssl, "Connecting to PostgreSQL");

    PgConnection::connect_with(&connect_options(config))
        .await
        .map_err(|source| MigrationError::Connection { target, source })
}
