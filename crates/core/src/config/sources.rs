use std::fmt;

/// Where a loaded setting came from. Logged at debug level so a deploy-time
/// run shows which values were defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this environment variable (a `.env` file counts)
    Env(String),
    /// Nothing set, built-in default used
    Default,
    /// Replaced after loading, e.g. by `--migrations-dir`
    Override,
}

impl ConfigSource {
    pub fn is_env(&self) -> bool {
        matches!(self, ConfigSource::Env(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default)
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Env(key) => write!(f, "env {}", key),
            ConfigSource::Default => f.write_str("default"),
            ConfigSource::Override => f.write_str("override"),
        }
    }
}
