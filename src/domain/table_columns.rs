use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::error::DiffError;

/// Per-table column lists, as given by `--unique` and `--ignore-tbl-col`.
///
/// Textual form is `table:col[,col...]`; the TOML form is a map of table name
/// to column array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TableColumns(pub BTreeMap<String, Vec<String>>);

impl TableColumns {
    /// Parse a list of `table:col,col` entries.
    ///
    /// A later entry for the same table replaces the earlier one.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, DiffError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let (table, cols) = parse_entry(entry.as_ref())?;
            map.insert(table, cols);
        }
        Ok(Self(map))
    }

    pub fn get(&self, table: &str) -> Option<&[String]> {
        self.0.get(table).map(|v| v.as_slice())
    }

    /// Overlay `other` on top of `self`; entries of `other` win per table.
    pub fn merge(&mut self, other: TableColumns) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_entry(entry: &str) -> Result<(String, Vec<String>), DiffError> {
    let mut parts = entry.split(':');
    let (Some(table), Some(cols), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DiffError::key_parse(entry, "expected exactly one `:`"));
    };

    let table = table.trim();
    if table.is_empty() {
        return Err(DiffError::key_parse(entry, "table name is empty"));
    }

    let cols: Vec<String> = cols.split(',').map(|c| c.trim().to_string()).collect();
    if cols.iter().any(|c| c.is_empty()) {
        return Err(DiffError::key_parse(entry, "empty column name"));
    }

    Ok((table.to_string(), cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_composite_keys() {
        let parsed = TableColumns::parse(&["users:id", "orders: region , code"]).unwrap();
        assert_eq!(parsed.get("users").unwrap(), ["id"]);
        assert_eq!(parsed.get("orders").unwrap(), ["region", "code"]);
        assert!(parsed.get("missing").is_none());
    }

    #[test]
    fn later_entry_replaces_earlier() {
        let parsed = TableColumns::parse(&["t:a", "t:b,c"]).unwrap();
        assert_eq!(parsed.get("t").unwrap(), ["b", "c"]);
    }

    #[test]
    fn rejects_missing_colon() {
        let err = TableColumns::parse(&["users"]).unwrap_err();
        assert!(matches!(err, DiffError::KeyParse { .. }));
    }

    #[test]
    fn rejects_two_colons() {
        assert!(TableColumns::parse(&["a:b:c"]).is_err());
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(TableColumns::parse(&[":id"]).is_err());
        assert!(TableColumns::parse(&["t:"]).is_err());
        assert!(TableColumns::parse(&["t:a,,b"]).is_err());
    }

    #[test]
    fn merge_overrides_per_table() {
        let mut base = TableColumns::parse(&["a:x", "b:y"]).unwrap();
        base.merge(TableColumns::parse(&["b:z"]).unwrap());
        assert_eq!(base.get("a").unwrap(), ["x"]);
        assert_eq!(base.get("b").unwrap(), ["z"]);
    }
}
