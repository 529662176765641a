use std::collections::{BTreeSet, HashSet};

use crate::domain::comparison::{ChangedTablePair, ComparisonReport, ReportRow, TableStatus};
use crate::domain::ports::Catalog;

/// Align the two catalogs by table name and classify every name.
///
/// Precedence per name: missing on one side, excluded by configuration,
/// equal fingerprints, differing definitions, and finally a genuine content
/// change, which is queued for row-level diffing. Rows come out sorted by
/// name so the report is reproducible.
pub fn compare(
    old: &Catalog,
    new: &Catalog,
    ignored_tables: &HashSet<String>,
) -> (ComparisonReport, Vec<ChangedTablePair>) {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    let mut rows = Vec::with_capacity(names.len());
    let mut changed = Vec::new();

    for name in names {
        let ignored = ignored_tables.contains(name.as_str());
        let (status, name_old, name_new) = match (old.get(name), new.get(name)) {
            (Some(_), None) => (TableStatus::Missing { ignored }, name.clone(), String::new()),
            (None, Some(_)) => (TableStatus::Missing { ignored }, String::new(), name.clone()),
            (Some(a), Some(b)) => {
                let status = if ignored {
                    TableStatus::Ignore
                } else if a.fingerprint == b.fingerprint {
                    TableStatus::Ok
                } else if a.raw_definition != b.raw_definition {
                    TableStatus::Invalid
                } else {
                    changed.push(ChangedTablePair {
                        index: changed.len(),
                        old: a.clone(),
                        new: b.clone(),
                    });
                    TableStatus::Ng
                };
                (status, name.clone(), name.clone())
            }
            (None, None) => unreachable!("name comes from one of the catalogs"),
        };

        rows.push(ReportRow {
            name_old,
            name_new,
            status,
            changes: None,
        });
    }

    (ComparisonReport { rows }, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table_def::TableDefinition;
    use crate::domain::value_objects::{ColumnDef, Fingerprint, IgnoredColumns, TableName};

    fn def(name: &str, fp: Option<&str>, sql: &str) -> TableDefinition {
        TableDefinition {
            name: TableName(name.into()),
            columns: vec![ColumnDef::new("id", "INTEGER")],
            primary_key: vec![],
            unique_override: None,
            ignored_columns: IgnoredColumns::default(),
            raw_definition: sql.into(),
            fingerprint: fp.map(|f| Fingerprint(f.into())),
            row_count: 0,
        }
    }

    fn catalog(defs: Vec<TableDefinition>) -> Catalog {
        defs.into_iter().map(|d| (d.name.0.clone(), d)).collect()
    }

    fn status_of<'a>(report: &'a ComparisonReport, name: &str) -> &'a ReportRow {
        report.rows.iter().find(|r| r.name() == name).unwrap()
    }

    const SQL: &str = "CREATE TABLE t (id INTEGER)";

    #[test]
    fn classifies_every_pairing() {
        let old = catalog(vec![
            def("same", Some("aa"), SQL),
            def("changed", Some("aa"), SQL),
            def("drift", Some("aa"), SQL),
            def("skipped", Some("aa"), SQL),
            def("only_old", Some("aa"), SQL),
        ]);
        let new = catalog(vec![
            def("same", Some("aa"), SQL),
            def("changed", Some("bb"), SQL),
            def("drift", Some("bb"), "CREATE TABLE t (id INTEGER, v TEXT)"),
            def("skipped", Some("bb"), SQL),
            def("only_new", Some("aa"), SQL),
        ]);
        let ignored: HashSet<String> = ["skipped".to_string()].into();

        let (report, changed) = compare(&old, &new, &ignored);

        assert_eq!(status_of(&report, "same").status, TableStatus::Ok);
        assert_eq!(status_of(&report, "changed").status, TableStatus::Ng);
        assert_eq!(status_of(&report, "drift").status, TableStatus::Invalid);
        assert_eq!(status_of(&report, "skipped").status, TableStatus::Ignore);

        let only_old = status_of(&report, "only_old");
        assert_eq!(only_old.status, TableStatus::Missing { ignored: false });
        assert_eq!(only_old.name_new, "");
        let only_new = status_of(&report, "only_new");
        assert_eq!(only_new.name_old, "");
        assert_eq!(only_new.status.label(), "");

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name(), "changed");
        assert_eq!(changed[0].index, 0);
    }

    #[test]
    fn both_fingerprints_absent_is_ok() {
        let old = catalog(vec![def("empty", None, SQL)]);
        let new = catalog(vec![def("empty", None, SQL)]);
        let (report, changed) = compare(&old, &new, &HashSet::new());
        assert_eq!(report.rows[0].status, TableStatus::Ok);
        assert!(changed.is_empty());
    }

    #[test]
    fn one_sided_absent_fingerprint_is_a_change() {
        let old = catalog(vec![def("t", None, SQL)]);
        let new = catalog(vec![def("t", Some("aa"), SQL)]);
        let (report, changed) = compare(&old, &new, &HashSet::new());
        assert_eq!(report.rows[0].status, TableStatus::Ng);
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn missing_and_ignored_is_tagged() {
        let old = catalog(vec![def("gone", Some("aa"), SQL)]);
        let ignored: HashSet<String> = ["gone".to_string()].into();
        let (report, changed) = compare(&old, &Catalog::new(), &ignored);
        assert_eq!(report.rows[0].status.label(), "ignore");
        assert!(changed.is_empty());
    }

    #[test]
    fn rows_sorted_by_name() {
        let old = catalog(vec![def("b", None, SQL), def("d", None, SQL)]);
        let new = catalog(vec![def("a", None, SQL), def("c", None, SQL)]);
        let (report, _) = compare(&old, &new, &HashSet::new());
        let names: Vec<&str> = report.rows.iter().map(|r| r.name()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }
}
