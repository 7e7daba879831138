//! Migration Source Reader - discovers migration files and fixes their run order
//!
//! Files are named `<letter><digits>__<description>.sql`. Run order is the
//! order of the upper-cased version tokens, which only matches numeric order
//! because every token in a directory has the same letter and the same width
//! (`V001`..`V999`). Discovery enforces that, so a bad file aborts the run
//! before anything is applied.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::{MigrationFile, VERSION_MAX_LEN};
use crate::error::{MigrationError, MigrationResult};

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]\d+)__").expect("version pattern is valid"));

static DESCRIPTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("description pattern is valid"));

const NAMING_CONTRACT: &str = "expected <letter><digits>__<description>.sql";
const DEFAULT_PREFIX: char = 'V';
const DEFAULT_WIDTH: usize = 3;

/// Extract the upper-cased version token from a migration file name.
///
/// `V001__create_schema.sql` -> `V001`
pub fn extract_version(filename: &str) -> MigrationResult<String> {
    VERSION_PATTERN
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_uppercase())
        .ok_or_else(|| MigrationError::invalid_filename(filename, NAMING_CONTRACT))
}

/// SHA-256 of the content's UTF-8 bytes, lowercase hex.
///
/// Used to notice edits to applied migrations. It is not a security control.
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

fn is_sql_file(name: &str) -> bool {
    name.to_lowercase().ends_with(".sql")
}

/// A directory of migration files
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List every regular `.sql` file in run order.
    ///
    /// # Errors
    ///
    /// - `MissingDirectory` if the directory does not exist
    /// - `Io` if it cannot be read
    /// - `InvalidFilename` if any file breaks the naming contract, uses a
    ///   version token with a different letter or width than the rest, has
    ///   a token too long for the ledger, or reuses a version token
    pub fn list(&self) -> MigrationResult<Vec<MigrationFile>> {
        if !self.dir.is_dir() {
            return Err(MigrationError::MissingDirectory {
                path: self.dir.clone(),
            });
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| MigrationError::io(&self.dir, e))?;

        let mut filenames = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io(&self.dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| MigrationError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if is_sql_file(&name) {
                filenames.push(name);
            }
        }

        let mut migrations = Vec::with_capacity(filenames.len());
        for filename in filenames {
            let version = extract_version(&filename)?;
            migrations.push(MigrationFile {
                path: self.dir.join(&filename),
                version,
                filename,
            });
        }

        // `v002` and `V003` must run in that order
        migrations.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        check_version_tokens(&migrations)?;

        tracing::debug!(
            dir = %self.dir.display(),
            count = migrations.len(),
            "Discovered migration files"
        );

        Ok(migrations)
    }

    /// Write an empty migration that sorts after every existing one.
    ///
    /// The new version continues the existing prefix letter and token width
    /// (`V` and three digits for an empty directory). Spaces and dashes in
    /// the description become underscores.
    pub fn create(&self, description: &str) -> MigrationResult<MigrationFile> {
        let description = description.trim().replace([' ', '-'], "_").to_lowercase();
        if !DESCRIPTION_PATTERN.is_match(&description) {
            return Err(MigrationError::invalid_filename(
                format!("__{}.sql", description),
                "description may only contain letters, digits, spaces, dashes and underscores",
            ));
        }

        fs::create_dir_all(&self.dir).map_err(|e| MigrationError::io(&self.dir, e))?;
        let existing = self.list()?;

        let (prefix, width, next) = match existing.last() {
            Some(last) => {
                let mut chars = last.version.chars();
                let prefix = chars.next().unwrap_or(DEFAULT_PREFIX);
                let digits: String = chars.collect();
                let number: u64 = digits.parse().map_err(|_| {
                    MigrationError::invalid_filename(&last.filename, "version number out of range")
                })?;
                (prefix, digits.len(), number + 1)
            }
            None => (DEFAULT_PREFIX, DEFAULT_WIDTH, 1),
        };

        let version = format!("{}{:0width$}", prefix, next, width = width);
        if version.len() != width + 1 {
            return Err(MigrationError::invalid_filename(
                format!("{}__{}.sql", version, description),
                format!("version space of {} digits is exhausted", width),
            ));
        }

        let filename = format!("{}__{}.sql", version, description);
        let path = self.dir.join(&filename);
        let template = format!(
            "-- Migration: {}\n-- Version: {}\n-- Created: {}\n\n",
            description,
            version,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        fs::write(&path, template).map_err(|e| MigrationError::io(&path, e))?;

        Ok(MigrationFile {
            version,
            filename,
            path,
        })
    }
}

// One letter and one width keep token order equal to numeric order; a
// shared token would make the second file invisible to the ledger.
fn check_version_tokens(migrations: &[MigrationFile]) -> MigrationResult<()> {
    let Some(first) = migrations.first() else {
        return Ok(());
    };
    let prefix = first.version.chars().next();

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for migration in migrations {
        if migration.version.len() > VERSION_MAX_LEN {
            return Err(MigrationError::invalid_filename(
                &migration.filename,
                format!(
                    "version token {} is longer than {} characters",
                    migration.version, VERSION_MAX_LEN
                ),
            ));
        }
        if migration.version.chars().next() != prefix {
            return Err(MigrationError::invalid_filename(
                &migration.filename,
                format!(
                    "version token {} does not use the same letter as {} in {}",
                    migration.version, first.version, first.filename
                ),
            ));
        }
        if migration.version.len() != first.version.len() {
            return Err(MigrationError::invalid_filename(
                &migration.filename,
                format!(
                    "version token {} is not the same width as {} in {}",
                    migration.version, first.version, first.filename
                ),
            ));
        }
        if let Some(other) = seen.insert(&migration.version, &migration.filename) {
            return Err(MigrationError::invalid_filename(
                &migration.filename,
                format!("version {} is already used by {}", migration.version, other),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("V001__create_schema.sql").unwrap(), "V001");
        assert_eq!(extract_version("v0042__lower.sql").unwrap(), "V0042");
        assert_eq!(extract_version("R12__repeatable.sql").unwrap(), "R12");
    }

    #[test]
    fn test_extract_version_rejects_bad_names() {
        for name in ["bad_name.sql", "V001_single_underscore.sql", "001__no_letter.sql", "V__no_digits.sql", "VV01__two_letters.sql"] {
            let err = extract_version(name).unwrap_err();
            assert!(
                matches!(err, MigrationError::InvalidFilename { ref filename, .. } if filename == name),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let checksum = compute_checksum("CREATE TABLE t (id INT);");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(checksum, compute_checksum("CREATE TABLE t (id INT);"));
        assert_ne!(checksum, compute_checksum("CREATE TABLE t (id BIGINT);"));
        assert_eq!(
            compute_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_list_sorts_and_filters() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V002__add_col.sql", "ALTER TABLE t ADD c INT;");
        write(temp_dir.path(), "V001__init.sql", "CREATE TABLE t (id INT);");
        write(temp_dir.path(), "V003__upper.SQL", "SELECT 1;");
        write(temp_dir.path(), "README.md", "not a migration");
        fs::create_dir(temp_dir.path().join("V004__directory.sql")).unwrap();

        let migrations = MigrationSource::new(temp_dir.path()).list().unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.filename.as_str()).collect();
        assert_eq!(names, vec!["V001__init.sql", "V002__add_col.sql", "V003__upper.SQL"]);
        assert_eq!(migrations[0].version, "V001");
        assert_eq!(migrations[0].read_content().unwrap(), "CREATE TABLE t (id INT);");
    }

    #[test]
    fn test_list_fails_on_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V001__init.sql", "");
        write(temp_dir.path(), "bad_name.sql", "");

        let err = MigrationSource::new(temp_dir.path()).list().unwrap_err();
        assert_eq!(err.filename(), Some("bad_name.sql"));
    }

    #[test]
    fn test_list_fails_on_mixed_widths() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V001__init.sql", "");
        write(temp_dir.path(), "V10__later.sql", "");

        let err = MigrationSource::new(temp_dir.path()).list().unwrap_err();
        assert_eq!(err.filename(), Some("V10__later.sql"));
    }

    #[test]
    fn test_list_orders_by_token_not_case() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V001__a.sql", "A");
        write(temp_dir.path(), "v002__b.sql", "B");
        write(temp_dir.path(), "V003__c.sql", "C");

        let migrations = MigrationSource::new(temp_dir.path()).list().unwrap();
        let versions: Vec<_> = migrations.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["V001", "V002", "V003"]);
        assert_eq!(migrations[1].filename, "v002__b.sql");
    }

    #[test]
    fn test_list_fails_on_mixed_letters() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V001__a.sql", "");
        write(temp_dir.path(), "A002__b.sql", "");

        let err = MigrationSource::new(temp_dir.path()).list().unwrap_err();
        assert_eq!(err.filename(), Some("V001__a.sql"));
        assert!(err.to_string().contains("same letter"));
    }

    #[test]
    fn test_list_fails_on_token_longer_than_ledger_column() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V0000000001__x.sql", "");

        let err = MigrationSource::new(temp_dir.path()).list().unwrap_err();
        assert_eq!(err.filename(), Some("V0000000001__x.sql"));
        assert!(err.to_string().contains("longer than 10"));

        fs::remove_file(temp_dir.path().join("V0000000001__x.sql")).unwrap();
        write(temp_dir.path(), "V000000001__x.sql", "");
        assert_eq!(MigrationSource::new(temp_dir.path()).list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_fails_on_shared_version() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V001__a.sql", "");
        write(temp_dir.path(), "V001__b.sql", "");

        let err = MigrationSource::new(temp_dir.path()).list().unwrap_err();
        assert!(err.to_string().contains("already used by V001__a.sql"));
    }

    #[test]
    fn test_list_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = MigrationSource::new(temp_dir.path().join("nope")).list().unwrap_err();
        assert!(matches!(err, MigrationError::MissingDirectory { .. }));
    }

    #[test]
    fn test_create_in_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let source = MigrationSource::new(temp_dir.path().join("migrations"));

        let created = source.create("Create Schema").unwrap();
        assert_eq!(created.filename, "V001__create_schema.sql");
        assert!(created.path.exists());
        assert!(created.read_content().unwrap().contains("-- Version: V001"));
    }

    #[test]
    fn test_create_continues_width_and_prefix() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "V0009__init.sql", "");

        let created = MigrationSource::new(temp_dir.path()).create("add-index").unwrap();
        assert_eq!(created.filename, "V0010__add_index.sql");
    }

    #[test]
    fn test_create_rejects_bad_description_and_exhausted_width() {
        let temp_dir = TempDir::new().unwrap();
        let source = MigrationSource::new(temp_dir.path());
        assert!(source.create("drop; table").is_err());
        assert!(source.create("   ").is_err());

        write(temp_dir.path(), "V9__last.sql", "");
        let err = source.create("one_more").unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }
}
