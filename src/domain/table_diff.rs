use serde::Serialize;
use std::borrow::Cow;

/// A single SQLite cell, one variant per storage class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Bytes fed to the fingerprint digest. NULL contributes an empty string.
    pub fn digest_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            SqlValue::Null => Cow::Borrowed(&[]),
            SqlValue::Integer(i) => Cow::Owned(i.to_string().into_bytes()),
            SqlValue::Real(f) => Cow::Owned(f.to_string().into_bytes()),
            SqlValue::Text(s) => Cow::Borrowed(s.as_bytes()),
            SqlValue::Blob(b) => Cow::Borrowed(b.as_slice()),
        }
    }

    /// Value equality as the update check sees it: an INTEGER and a REAL
    /// holding the same number are equal, every other pairing must match
    /// storage class and content.
    pub fn same_as(&self, other: &SqlValue) -> bool {
        match (self, other) {
            (SqlValue::Integer(i), SqlValue::Real(f)) | (SqlValue::Real(f), SqlValue::Integer(i)) => {
                *i as f64 == *f
            }
            _ => self == other,
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r}"),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// Render a key tuple for log and error messages: `(1, 'a')`.
pub fn format_key(values: &[SqlValue]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// Status tag written into the leading column of every output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiffStatus {
    /// Key present only in the new database.
    #[serde(rename = "+")]
    Inserted,
    /// Key present only in the old database.
    #[serde(rename = "-")]
    Deleted,
    /// Old values of an updated row.
    #[serde(rename = "u-")]
    UpdatedOld,
    /// New values of an updated row.
    #[serde(rename = "u+")]
    UpdatedNew,
    /// Unique-key violation inside the old database's changed rows.
    #[serde(rename = "dup_old")]
    DuplicateOld,
    /// Unique-key violation inside the new database's changed rows.
    #[serde(rename = "dup_new")]
    DuplicateNew,
}

impl DiffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffStatus::Inserted => "+",
            DiffStatus::Deleted => "-",
            DiffStatus::UpdatedOld => "u-",
            DiffStatus::UpdatedNew => "u+",
            DiffStatus::DuplicateOld => "dup_old",
            DiffStatus::DuplicateNew => "dup_new",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One materialized output row: status plus the full values of one side's row,
/// in the source table's column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRecord {
    pub status: DiffStatus,
    pub values: Vec<SqlValue>,
}

impl DiffRecord {
    pub fn new(status: DiffStatus, values: Vec<SqlValue>) -> Self {
        Self { status, values }
    }
}

/// Row-level result for one changed table.
#[derive(Debug, Clone, Serialize)]
pub struct TableDiff {
    pub table_name: String,
    /// Name of the synthetic leading column (`status`, or `status1`, … on collision).
    pub status_column: String,
    pub columns: Vec<String>,
    pub records: Vec<DiffRecord>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in &self.records {
            match record.status {
                DiffStatus::Inserted => counts.inserted += 1,
                DiffStatus::Deleted => counts.deleted += 1,
                // an update is one u-/u+ pair
                DiffStatus::UpdatedOld => counts.updated += 1,
                DiffStatus::UpdatedNew => {}
                DiffStatus::DuplicateOld => counts.duplicate_old += 1,
                DiffStatus::DuplicateNew => counts.duplicate_new += 1,
            }
        }
        counts
    }
}

/// Number of emitted records per status for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub inserted: usize,
    pub deleted: usize,
    pub updated: usize,
    pub duplicate_old: usize,
    pub duplicate_new: usize,
}

impl StatusCounts {
    /// Changed keys: an update counts once.
    pub fn total(&self) -> usize {
        self.inserted + self.deleted + self.updated + self.duplicate_old + self.duplicate_new
    }

    /// Rows stored in the output table: an update is a `u-` and a `u+` row.
    pub fn written(&self) -> usize {
        self.total() + self.updated
    }
}

/// Pick the synthetic status column name: `status`, then `status1`,
/// `status2`, … until it collides with none of `columns`.
pub fn status_column_name<S: AsRef<str>>(columns: &[S]) -> String {
    let taken = |name: &str| columns.iter().any(|c| c.as_ref().eq_ignore_ascii_case(name));
    let mut n = 0usize;
    loop {
        let candidate = if n == 0 {
            "status".to_string()
        } else {
            format!("status{n}")
        };
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_column_avoids_existing_names() {
        assert_eq!(status_column_name(&["id", "v"]), "status");
        assert_eq!(status_column_name(&["status", "v"]), "status1");
        assert_eq!(status_column_name(&["Status", "status1"]), "status2");
    }

    #[test]
    fn integer_and_real_compare_numerically() {
        assert!(SqlValue::Integer(1).same_as(&SqlValue::Real(1.0)));
        assert!(!SqlValue::Integer(1).same_as(&SqlValue::Text("1".into())));
        assert!(SqlValue::Null.same_as(&SqlValue::Null));
        assert!(!SqlValue::Null.same_as(&SqlValue::Text(String::new())));
    }

    #[test]
    fn null_digests_as_empty_string() {
        assert_eq!(SqlValue::Null.digest_bytes().as_ref(), b"");
        assert_eq!(SqlValue::Integer(42).digest_bytes().as_ref(), b"42");
    }

    #[test]
    fn counts_pairs_updates_once() {
        let diff = TableDiff {
            table_name: "t".into(),
            status_column: "status".into(),
            columns: vec!["id".into()],
            records: vec![
                DiffRecord::new(DiffStatus::Deleted, vec![SqlValue::Integer(1)]),
                DiffRecord::new(DiffStatus::UpdatedOld, vec![SqlValue::Integer(2)]),
                DiffRecord::new(DiffStatus::UpdatedNew, vec![SqlValue::Integer(2)]),
            ],
        };
        let counts = diff.counts();
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.written(), diff.records.len());
    }

    #[test]
    fn key_formatting_quotes_text() {
        let key = [SqlValue::Integer(1), SqlValue::Text("o'k".into()), SqlValue::Null];
        assert_eq!(format_key(&key), "(1, 'o''k', NULL)");
    }
}
