//! Table rendering for the ledger and validation reports

use chrono::NaiveDateTime;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use digest_migrate::{LedgerEntry, LedgerStatus, MigrationFile, ValidationReport, LEDGER_TABLE};

const MISSING: &str = "-";

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_executed_at(executed_at: Option<NaiveDateTime>) -> String {
    executed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

pub fn ledger_table(entries: &[LedgerEntry]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["version", "filename", "executed_at", "execution_time_ms", "checksum"]);
    for entry in entries {
        table.add_row(vec![
            entry.version.clone(),
            entry.filename.clone(),
            format_executed_at(entry.executed_at),
            entry
                .execution_time_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            entry.checksum.clone().unwrap_or_else(|| MISSING.to_string()),
        ]);
    }
    table
}

/// Human-readable ledger view. Absent and empty ledgers are messages, not tables.
pub fn render_status(status: &LedgerStatus) -> String {
    match status {
        LedgerStatus::Absent => format!(
            "No migrations applied yet ({} table does not exist).",
            LEDGER_TABLE
        ),
        LedgerStatus::Empty => "No migrations applied yet.".to_string(),
        LedgerStatus::Applied(entries) => ledger_table(entries).to_string(),
    }
}

pub fn render_pending(pending: &[MigrationFile]) -> String {
    if pending.is_empty() {
        return "No pending migrations.".to_string();
    }

    let mut table = create_table();
    table.set_header(vec!["version", "pending filename"]);
    for file in pending {
        table.add_row(vec![file.version.clone(), file.filename.clone()]);
    }
    table.to_string()
}

pub fn render_validation(report: &ValidationReport) -> String {
    let mut table = create_table();
    table.set_header(vec!["version", "filename", "state", "detail"]);

    for file in &report.verified {
        table.add_row(vec![file.version.as_str(), file.filename.as_str(), "verified", ""]);
    }
    for drift in &report.drifted {
        let detail = format!(
            "applied as {} with checksum {}, now {}",
            drift.prior_filename, drift.prior_checksum, drift.current_checksum
        );
        table.add_row(vec![
            drift.version.clone(),
            drift.filename.clone(),
            "drifted".to_string(),
            detail,
        ]);
    }
    for file in &report.pending {
        table.add_row(vec![file.version.as_str(), file.filename.as_str(), "pending", ""]);
    }
    for entry in &report.orphaned {
        table.add_row(vec![
            entry.version.as_str(),
            entry.filename.as_str(),
            "orphaned",
            "recorded in the ledger, no file on disk",
        ]);
    }

    format!(
        "{}\n{} verified, {} pending, {} drifted, {} orphaned",
        table,
        report.verified.len(),
        report.pending.len(),
        report.drifted.len(),
        report.orphaned.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(checksum: Option<&str>, executed_at: Option<NaiveDateTime>) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            version: "V001".to_string(),
            filename: "V001__create_schema.sql".to_string(),
            executed_at,
            execution_time_ms: checksum.map(|_| 42),
            checksum: checksum.map(str::to_string),
        }
    }

    #[test]
    fn test_absent_and_empty_messages() {
        assert_eq!(
            render_status(&LedgerStatus::Absent),
            "No migrations applied yet (public.schema_migrations table does not exist)."
        );
        assert_eq!(render_status(&LedgerStatus::Empty), "No migrations applied yet.");
    }

    #[test]
    fn test_ledger_table_contents() {
        let executed_at = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9));
        let rendered = render_status(&LedgerStatus::Applied(vec![entry(Some("deadbeef"), executed_at)]));

        assert!(rendered.contains("execution_time_ms"));
        assert!(rendered.contains("V001__create_schema.sql"));
        assert!(rendered.contains("2024-03-05 14:07:09"));
        assert!(rendered.contains("42"));
        assert!(rendered.contains("deadbeef"));
    }

    #[test]
    fn test_null_columns_render_as_dash() {
        let rendered = ledger_table(&[entry(None, None)]).to_string();
        let row = rendered
            .lines()
            .find(|line| line.contains("V001__create_schema.sql"))
            .unwrap();
        assert_eq!(row.matches(" - ").count(), 3);
    }

    #[test]
    fn test_render_pending_empty() {
        assert_eq!(render_pending(&[]), "No pending migrations.");
    }

    #[test]
    fn test_render_validation_summary_line() {
        let report = ValidationReport {
            orphaned: vec![entry(Some("abc"), None)],
            ..ValidationReport::default()
        };
        let rendered = render_validation(&report);
        assert!(rendered.contains("orphaned"));
        assert!(rendered.ends_with("0 verified, 0 pending, 0 drifted, 1 orphaned"));
    }
}
