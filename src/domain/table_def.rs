use serde::Serialize;

use crate::domain::value_objects::{ColumnDef, ColumnName, Fingerprint, IgnoredColumns, TableName};

/// Everything the comparator and the row differ need to know about one table
/// of one database. Built once per load, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct TableDefinition {
    pub name: TableName,
    /// Columns in physical declaration order.
    pub columns: Vec<ColumnDef>,
    /// Declared primary key, in key order. Empty when the table has none.
    pub primary_key: Vec<ColumnName>,
    /// Key supplied by configuration, replacing `primary_key` for diffing.
    pub unique_override: Option<Vec<ColumnName>>,
    pub ignored_columns: IgnoredColumns,
    /// `CREATE TABLE` text; compared verbatim to detect schema drift.
    pub raw_definition: String,
    /// `None` iff the table has no rows or every column is ignored.
    pub fingerprint: Option<Fingerprint>,
    pub row_count: u64,
}

/// Which rule produced an [`EffectiveKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Override,
    PrimaryKey,
    FullRow,
}

/// Column set identifying "the same" row on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveKey {
    pub columns: Vec<ColumnName>,
    pub source: KeySource,
}

impl TableDefinition {
    pub fn column_names(&self) -> impl Iterator<Item = &ColumnName> + '_ {
        self.columns.iter().map(|c| &c.name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.as_str() == name)
    }

    /// Columns that feed the fingerprint and the update comparison.
    pub fn compared_columns(&self) -> Vec<ColumnName> {
        self.column_names()
            .filter(|c| !self.ignored_columns.contains(c.as_str()))
            .cloned()
            .collect()
    }

    /// Resolve the key: configured override, else the declared primary key,
    /// else every column as one composite key.
    pub fn effective_key(&self) -> EffectiveKey {
        if let Some(cols) = &self.unique_override {
            return EffectiveKey {
                columns: cols.clone(),
                source: KeySource::Override,
            };
        }
        if !self.primary_key.is_empty() {
            return EffectiveKey {
                columns: self.primary_key.clone(),
                source: KeySource::PrimaryKey,
            };
        }
        EffectiveKey {
            columns: self.column_names().cloned().collect(),
            source: KeySource::FullRow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName(n.to_string())).collect()
    }

    fn table(primary_key: &[&str], unique: Option<&[&str]>) -> TableDefinition {
        TableDefinition {
            name: TableName("t".into()),
            columns: vec![
                ColumnDef::new("id", "INTEGER"),
                ColumnDef::new("code", "TEXT"),
                ColumnDef::new("v", "TEXT"),
            ],
            primary_key: cols(primary_key),
            unique_override: unique.map(cols),
            ignored_columns: IgnoredColumns::default(),
            raw_definition: String::new(),
            fingerprint: None,
            row_count: 0,
        }
    }

    #[test]
    fn override_wins_over_primary_key() {
        let key = table(&["id"], Some(&["code"])).effective_key();
        assert_eq!(key.source, KeySource::Override);
        assert_eq!(key.columns, cols(&["code"]));
    }

    #[test]
    fn primary_key_used_without_override() {
        let key = table(&["id", "code"], None).effective_key();
        assert_eq!(key.source, KeySource::PrimaryKey);
        assert_eq!(key.columns, cols(&["id", "code"]));
    }

    #[test]
    fn full_row_when_nothing_declared() {
        let key = table(&[], None).effective_key();
        assert_eq!(key.source, KeySource::FullRow);
        assert_eq!(key.columns, cols(&["id", "code", "v"]));
    }

    #[test]
    fn compared_columns_skip_ignored() {
        let mut t = table(&["id"], None);
        t.ignored_columns = ["v"].into_iter().collect();
        assert_eq!(t.compared_columns(), cols(&["id", "code"]));
    }
}
