use crate::domain::comparison::{ComparisonReport, ReportRow, TableStatus};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Everything one run produced, in a shape the report writers and library
/// callers can consume.
#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub created_at: String,
    pub old_db: String,
    pub new_db: String,
    pub tables: Vec<ReportRow>,
    pub summary: Summary,
    /// Location of the output store; absent when no table differed.
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub tables_ok: usize,
    pub tables_changed: usize,
    pub tables_invalid: usize,
    pub tables_ignored: usize,
    pub tables_missing: usize,
    pub total_records: usize,
}

impl RunReport {
    pub fn new(
        old_db: &str,
        new_db: &str,
        report: ComparisonReport,
        output_path: Option<String>,
    ) -> Self {
        let summary = Summary {
            tables_ok: report.count(|s| s == TableStatus::Ok),
            tables_changed: report.count(|s| s == TableStatus::Ng),
            tables_invalid: report.count(|s| s == TableStatus::Invalid),
            tables_ignored: report.count(|s| s == TableStatus::Ignore),
            tables_missing: report.count(|s| matches!(s, TableStatus::Missing { .. })),
            total_records: report
                .rows
                .iter()
                .filter_map(|r| r.changes)
                .map(|c| c.written())
                .sum(),
        };

        RunReport {
            run_id: format!(
                "run_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            created_at: Utc::now().to_rfc3339(),
            old_db: old_db.to_string(),
            new_db: new_db.to_string(),
            tables: report.rows,
            summary,
            output_path,
        }
    }
}
