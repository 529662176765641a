use serde::Serialize;

use crate::domain::table_def::TableDefinition;
use crate::domain::table_diff::StatusCounts;

/// Table-level classification of one name across the two databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Fingerprints equal (including both absent).
    Ok,
    /// Fingerprints differ, definitions equal: diffed row by row.
    Ng,
    /// Fingerprints and definitions differ: schema drift, never diffed.
    Invalid,
    /// Present on both sides but excluded by configuration.
    Ignore,
    /// Present on one side only. `ignored` is set when the name is also
    /// excluded by configuration.
    Missing { ignored: bool },
}

impl TableStatus {
    /// Label printed in the report's status column.
    pub fn label(self) -> &'static str {
        match self {
            TableStatus::Ok => "OK",
            TableStatus::Ng => "NG",
            TableStatus::Invalid => "Invalid",
            TableStatus::Ignore => "Ignore",
            TableStatus::Missing { ignored: true } => "ignore",
            TableStatus::Missing { ignored: false } => "",
        }
    }
}

/// One line of the comparison report. The name of a side where the table
/// does not exist is left empty.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub name_old: String,
    pub name_new: String,
    pub status: TableStatus,
    /// Row-level counts, filled in once the table has been diffed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<StatusCounts>,
}

impl ReportRow {
    /// The table name, whichever side it exists on.
    pub fn name(&self) -> &str {
        if self.name_old.is_empty() {
            &self.name_new
        } else {
            &self.name_old
        }
    }
}

/// Comparator output, sorted by table name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    pub rows: Vec<ReportRow>,
}

impl ComparisonReport {
    pub fn count(&self, pred: impl Fn(TableStatus) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(r.status)).count()
    }

    pub fn has_changes(&self) -> bool {
        self.rows.iter().any(|r| r.status == TableStatus::Ng)
    }

    pub fn set_changes(&mut self, table: &str, counts: StatusCounts) {
        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|r| r.status == TableStatus::Ng && r.name() == table)
        {
            row.changes = Some(counts);
        }
    }
}

/// A table whose content differs while its definition does not; input of the
/// row-level differ.
#[derive(Debug, Clone)]
pub struct ChangedTablePair {
    /// Position in the changed list. Keeps per-table scratch names distinct.
    pub index: usize,
    pub old: TableDefinition,
    pub new: TableDefinition,
}

impl ChangedTablePair {
    pub fn name(&self) -> &str {
        &self.old.name.0
    }
}
