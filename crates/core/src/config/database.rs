use crate::config::{ConfigError, ConfigSource};
use std::collections::HashMap;
use std::env::{self, VarError};
use std::fmt;
use std::path::PathBuf;

pub const HOST_VAR: &str = "DB_POSTGRESDB_HOST";
pub const PORT_VAR: &str = "DB_POSTGRESDB_PORT";
pub const DATABASE_VAR: &str = "DB_POSTGRESDB_DATABASE";
pub const USER_VAR: &str = "DB_POSTGRESDB_USER";
pub const PASSWORD_VAR: &str = "DB_POSTGRESDB_PASSWORD";
pub const SSL_VAR: &str = "DB_POSTGRESDB_SSL";
pub const MIGRATIONS_DIR_VAR: &str = "MIGRATIONS_DIR";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_MIGRATIONS_DIR: &str = "database/migrations";

/// Connection parameters for the PostgreSQL database holding the ledger.
///
/// `ssl = true` means "encrypt, but accept whatever certificate the server
/// presents". Hosted providers with managed certificates rely on this.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: None,
            ssl: false,
        }
    }
}

impl DatabaseConfig {
    /// Load connection parameters from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Settings::from_env()?.database)
    }

    /// `host:port/database`, safe to log
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl", &self.ssl)
            .finish()
    }
}

/// Everything the migration tooling reads at process start
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub migrations_dir: PathBuf,
    sources: HashMap<String, ConfigSource>,
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let mut loader = Loader {
            lookup,
            sources: HashMap::new(),
        };

        let host = loader.string("host", HOST_VAR, DEFAULT_HOST)?;
        let port = loader.port("port", PORT_VAR)?;
        let database = loader.string("database", DATABASE_VAR, DEFAULT_DATABASE)?;
        let user = loader.string("user", USER_VAR, DEFAULT_USER)?;
        let password = loader.optional("password", PASSWORD_VAR)?;
        let ssl = loader.flag("ssl", SSL_VAR)?;
        let migrations_dir =
            PathBuf::from(loader.string("migrations_dir", MIGRATIONS_DIR_VAR, DEFAULT_MIGRATIONS_DIR)?);

        Ok(Self {
            database: DatabaseConfig {
                host,
                port,
                database,
                user,
                password,
                ssl,
            },
            migrations_dir,
            sources: loader.sources,
        })
    }

    /// Override the migrations directory (e.g. from a command-line flag)
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self.sources
            .insert("migrations_dir".to_string(), ConfigSource::Override);
        self
    }

    /// Where each setting came from, keyed by field name
    pub fn config_sources(&self) -> &HashMap<String, ConfigSource> {
        &self.sources
    }
}

fn env_lookup(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
            "{} is not valid unicode",
            key
        ))),
    }
}

struct Loader<F> {
    lookup: F,
    sources: HashMap<String, ConfigSource>,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Result<Option<String>, ConfigError>,
{
    fn raw(&mut self, field: &str, key: &str) -> Result<Option<String>, ConfigError> {
        let value = (self.lookup)(key)?.filter(|v| !v.trim().is_empty());
        if value.is_some() {
            self.sources
                .insert(field.to_string(), ConfigSource::Env(key.to_string()));
        }
        Ok(value)
    }

    fn string(&mut self, field: &str, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.raw(field, key)? {
            Some(value) => Ok(value),
            None => {
                self.sources.insert(field.to_string(), ConfigSource::Default);
                Ok(default.to_string())
            }
        }
    }

    fn optional(&mut self, field: &str, key: &str) -> Result<Option<String>, ConfigError> {
        self.raw(field, key)
    }

    fn port(&mut self, field: &str, key: &str) -> Result<u16, ConfigError> {
        match self.raw(field, key)? {
            Some(value) => value.trim().parse::<u16>().map_err(|_| {
                ConfigError::invalid_value(key, value, "a port number between 0 and 65535")
            }),
            None => {
                self.sources.insert(field.to_string(), ConfigSource::Default);
                Ok(DEFAULT_PORT)
            }
        }
    }

    // Only a case-insensitive "true" enables the flag; anything else is off.
    fn flag(&mut self, field: &str, key: &str) -> Result<bool, ConfigError> {
        match self.raw(field, key)? {
            Some(value) => Ok(value.trim().eq_ignore_ascii_case("true")),
            None => {
                self.sources.insert(field.to_string(), ConfigSource::Default);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(move |key| Ok(vars.get(key).cloned()))
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.database, DatabaseConfig::default());
        assert_eq!(settings.database.host, "localhost");
        assert_eq!(settings.database.port, 5432);
        assert_eq!(settings.database.database, "postgres");
        assert_eq!(settings.database.user, "postgres");
        assert!(settings.database.password.is_none());
        assert!(!settings.database.ssl);
        assert_eq!(settings.migrations_dir, PathBuf::from("database/migrations"));
        assert!(settings.config_sources()["host"].is_default());
    }

    #[test]
    fn test_values_from_environment() {
        let settings = settings_from(&[
            (HOST_VAR, "db.internal"),
            (PORT_VAR, "6543"),
            (DATABASE_VAR, "digest"),
            (USER_VAR, "digest_app"),
            (PASSWORD_VAR, "hunter2"),
            (SSL_VAR, "TRUE"),
            (MIGRATIONS_DIR_VAR, "sql/migrations"),
        ])
        .unwrap();

        let db = &settings.database;
        assert_eq!(db.host, "db.internal");
        assert_eq!(db.port, 6543);
        assert_eq!(db.database, "digest");
        assert_eq!(db.user, "digest_app");
        assert_eq!(db.password.as_deref(), Some("hunter2"));
        assert!(db.ssl);
        assert_eq!(settings.migrations_dir, PathBuf::from("sql/migrations"));
        assert_eq!(
            settings.config_sources()["port"],
            ConfigSource::Env(PORT_VAR.to_string())
        );
    }

    #[test]
    fn test_ssl_only_enabled_by_true() {
        for value in ["1", "yes", "on", "false", "truthy"] {
            let settings = settings_from(&[(SSL_VAR, value)]).unwrap();
            assert!(!settings.database.ssl, "{} should not enable ssl", value);
        }
        let settings = settings_from(&[(SSL_VAR, "True")]).unwrap();
        assert!(settings.database.ssl);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let settings = settings_from(&[(HOST_VAR, ""), (PASSWORD_VAR, "  ")]).unwrap();
        assert_eq!(settings.database.host, DEFAULT_HOST);
        assert!(settings.database.password.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = settings_from(&[(PORT_VAR, "postgres")]).unwrap_err();
        match err {
            ConfigError::InvalidValue { field, value, .. } => {
                assert_eq!(field, PORT_VAR);
                assert_eq!(value, "postgres");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(settings_from(&[(PORT_VAR, "70000")]).is_err());
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let result = Settings::from_lookup(|key| {
            if key == USER_VAR {
                Err(ConfigError::environment_error("USER is not valid unicode"))
            } else {
                Ok(None)
            }
        });
        assert!(matches!(result, Err(ConfigError::EnvironmentError { .. })));
    }

    #[test]
    fn test_target_and_debug_hide_password() {
        let config = DatabaseConfig {
            password: Some("s3cret".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(config.target(), "localhost:5432/postgres");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(config.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_migrations_dir_override() {
        let settings = settings_from(&[]).unwrap().with_migrations_dir("elsewhere");
        assert_eq!(settings.migrations_dir, PathBuf::from("elsewhere"));
        assert_eq!(
            settings.config_sources()["migrations_dir"],
            ConfigSource::Override
        );
    }
}
