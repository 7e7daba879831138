use anyhow::{bail, Context};
use digest_core::Settings;
use digest_migrate::migrations::pending_migrations;
use digest_migrate::MigrationSource;
use serde_json::json;

use super::output;

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let summary =
        digest_migrate::run_migrations(&settings.database, &settings.migrations_dir).await?;
    println!("{}", summary);
    Ok(())
}

pub async fn status(settings: &Settings, include_pending: bool, json: bool) -> anyhow::Result<()> {
    let status = digest_migrate::show_status(&settings.database).await?;

    let pending = if include_pending {
        let source = MigrationSource::new(&settings.migrations_dir);
        Some(pending_migrations(&source, &status)?)
    } else {
        None
    };

    if json {
        let value = json!({ "ledger": status, "pending": pending });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", output::render_status(&status));
    if let Some(pending) = pending {
        println!("{}", output::render_pending(&pending));
    }
    Ok(())
}

pub async fn validate(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let report =
        digest_migrate::validate_migrations(&settings.database, &settings.migrations_dir).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output::render_validation(&report));
    }

    if !report.is_clean() {
        bail!(
            "{} applied migration(s) changed since they ran",
            report.drifted.len()
        );
    }
    Ok(())
}

pub fn create(settings: &Settings, description: &str) -> anyhow::Result<()> {
    let file = MigrationSource::new(&settings.migrations_dir)
        .create(description)
        .with_context(|| {
            format!(
                "Could not create migration in {}",
                settings.migrations_dir.display()
            )
        })?;
    println!("Created migration: {}", file.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_for(dir: &std::path::Path) -> Settings {
        Settings::from_lookup(|_| Ok(None)).unwrap().with_migrations_dir(dir)
    }

    #[test]
    fn test_create_writes_sequential_files() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings_for(&temp_dir.path().join("migrations"));

        create(&settings, "create schema").unwrap();
        create(&settings, "add email").unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&settings.migrations_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["V001__create_schema.sql", "V002__add_email.sql"]);
    }

    #[test]
    fn test_create_reports_bad_description() {
        let temp_dir = TempDir::new().unwrap();
        let err = create(&settings_for(temp_dir.path()), "drop;table").unwrap_err();
        assert!(err.to_string().contains("Could not create migration"));
    }
}
