use crate::domain::value_objects::ColumnName;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Schema name of the old database on a differ connection.
pub const OLD_SCHEMA: &str = "src_old";
/// Schema name of the new database on a differ connection.
pub const NEW_SCHEMA: &str = "src_new";

/// Quote an identifier (table, column) with double quotes, doubling any
/// embedded quote.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `schema."table"`; `schema` is always one of the crate's own constants.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, quote_ident(table))
}

/// `"a", "b", "c"`, optionally prefixed with a table alias.
pub fn column_list(cols: &[ColumnName], alias: Option<&str>) -> String {
    cols.iter()
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, quote_ident(&c.0)),
            None => quote_ident(&c.0),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// First of SQLite's rowid names (`rowid`, `_rowid_`, `oid`) that no column
/// of `cols` shadows; `None` when all three are taken.
pub fn rowid_alias(cols: &[ColumnName]) -> Option<&'static str> {
    ["rowid", "_rowid_", "oid"]
        .into_iter()
        .find(|alias| !cols.iter().any(|c| c.0.eq_ignore_ascii_case(alias)))
}

/// Declared type reduced to the part SQLite uses for affinity: the text before
/// any `(`, restricted to identifier characters and spaces.
pub fn affinity_type(decl_type: &str) -> String {
    decl_type
        .split('(')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

/// Build `SELECT <cols> FROM "<table>" ORDER BY <cols>` for a fingerprint scan.
pub fn build_fingerprint_query(table: &str, cols: &[ColumnName]) -> String {
    let list = column_list(cols, None);
    format!("SELECT {} FROM {} ORDER BY {}", list, quote_ident(table), list)
}

/// Build `CREATE TEMP TABLE <tmp> AS SELECT <cols> FROM <a> EXCEPT SELECT <cols> FROM <b>`.
pub fn build_except_table_query(tmp: &str, cols: &[ColumnName], from: &str, minus: &str) -> String {
    let list = column_list(cols, None);
    format!(
        "CREATE TEMP TABLE {} AS SELECT {} FROM {} EXCEPT SELECT {} FROM {}",
        quote_ident(tmp),
        list,
        from,
        list,
        minus
    )
}

/// Build the key set operation `SELECT <key> FROM <a> <op> SELECT <key> FROM <b>`,
/// ordered by every key column so the emission order is reproducible.
pub fn build_key_set_query(key: &[ColumnName], a: &str, op: &str, b: &str) -> String {
    let list = column_list(key, None);
    let order: Vec<String> = (1..=key.len()).map(|i| i.to_string()).collect();
    format!(
        "SELECT {} FROM {} {} SELECT {} FROM {} ORDER BY {}",
        list,
        quote_ident(a),
        op,
        list,
        quote_ident(b),
        order.join(", ")
    )
}

/// Build `CREATE TEMP TABLE <keys> AS <key set query>`: the key set stored in
/// emission order, so that its rowids follow [`build_key_set_query`]'s order.
pub fn build_key_table_query(keys: &str, key: &[ColumnName], a: &str, op: &str, b: &str) -> String {
    format!(
        "CREATE TEMP TABLE {} AS {}",
        quote_ident(keys),
        build_key_set_query(key, a, op, b)
    )
}

/// Build one page read over a key table: `SELECT <rowid>, <key> FROM <keys>
/// WHERE <rowid> > ?1 ORDER BY <rowid> LIMIT ?2`.
pub fn build_key_page_query(keys: &str, key: &[ColumnName], rowid: &str) -> String {
    format!(
        "SELECT {rowid}, {} FROM {} WHERE {rowid} > ?1 ORDER BY {rowid} LIMIT ?2",
        column_list(key, None),
        quote_ident(keys)
    )
}

/// Build the per-key lookup `SELECT <cols> FROM <tmp> WHERE k1 IS ?1 AND …`,
/// returning the lowest-rowid match. `IS` keeps NULL keys matchable, the same
/// way `EXCEPT`/`INTERSECT` treat NULLs as equal.
pub fn build_lookup_query(
    tmp: &str,
    cols: &[ColumnName],
    key: &[ColumnName],
    rowid: &str,
) -> String {
    let predicate: Vec<String> = key
        .iter()
        .enumerate()
        .map(|(i, k)| format!("{} IS ?{}", quote_ident(&k.0), i + 1))
        .collect();
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {rowid} LIMIT 1",
        column_list(cols, None),
        quote_ident(tmp),
        predicate.join(" AND ")
    )
}

/// Build the duplicate-key scan: rows of `tmp` sharing their key with another
/// row (different rowid) of the same table.
pub fn build_duplicate_query(
    tmp: &str,
    cols: &[ColumnName],
    key: &[ColumnName],
    rowid: &str,
) -> String {
    let predicate: Vec<String> = key
        .iter()
        .map(|k| {
            let q = quote_ident(&k.0);
            format!("x.{q} IS y.{q}")
        })
        .collect();
    let table = quote_ident(tmp);
    format!(
        "SELECT {} FROM {table} AS x WHERE EXISTS (SELECT 1 FROM {table} AS y WHERE {} AND x.{rowid} <> y.{rowid}) ORDER BY x.{rowid}",
        column_list(cols, Some("x")),
        predicate.join(" AND ")
    )
}

/// Build `CREATE TABLE "<table>" ("<status>" TEXT, "<col>" <type>, …)`.
pub fn build_output_table_query(table: &str, status_column: &str, cols: &[(String, String)]) -> String {
    let mut defs = vec![format!("{} TEXT", quote_ident(status_column))];
    for (name, decl_type) in cols {
        let ty = affinity_type(decl_type);
        if ty.is_empty() {
            defs.push(quote_ident(name));
        } else {
            defs.push(format!("{} {}", quote_ident(name), ty));
        }
    }
    format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", "))
}

/// Build `INSERT INTO "<table>" ("<status>", "<col>", …) VALUES (?1, ?2, …)`.
pub fn build_insert_query(table: &str, status_column: &str, cols: &[String]) -> String {
    let names: Vec<String> = std::iter::once(status_column)
        .chain(cols.iter().map(String::as_str))
        .map(quote_ident)
        .collect();
    let params: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        params.join(", ")
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName(n.to_string())).collect()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("my_table"), r#""my_table""#);
        assert_eq!(quote_ident(r#"ta"ble"#), r#""ta""ble""#);
    }

    #[test]
    fn test_qualified() {
        assert_eq!(qualified(OLD_SCHEMA, "t"), r#"src_old."t""#);
    }

    #[test]
    fn test_affinity_type() {
        assert_eq!(affinity_type("VARCHAR(10)"), "VARCHAR");
        assert_eq!(affinity_type("DECIMAL(10,2)"), "DECIMAL");
        assert_eq!(affinity_type("unsigned big int"), "unsigned big int");
        assert_eq!(affinity_type("INT); DROP TABLE x; --"), "INT DROP TABLE x");
        assert_eq!(affinity_type(""), "");
    }

    #[test]
    fn test_build_fingerprint_query() {
        let q = build_fingerprint_query("t", &cols(&["id", "v"]));
        assert_eq!(q, r#"SELECT "id", "v" FROM "t" ORDER BY "id", "v""#);
    }

    #[test]
    fn test_build_except_table_query() {
        let q = build_except_table_query(
            "_sqd_0_old",
            &cols(&["id"]),
            &qualified(OLD_SCHEMA, "t"),
            &qualified(NEW_SCHEMA, "t"),
        );
        assert_eq!(
            q,
            r#"CREATE TEMP TABLE "_sqd_0_old" AS SELECT "id" FROM src_old."t" EXCEPT SELECT "id" FROM src_new."t""#
        );
    }

    #[test]
    fn test_build_key_set_query_orders_by_position() {
        let q = build_key_set_query(&cols(&["a", "b"]), "x", "INTERSECT", "y");
        assert_eq!(
            q,
            r#"SELECT "a", "b" FROM "x" INTERSECT SELECT "a", "b" FROM "y" ORDER BY 1, 2"#
        );
    }

    #[test]
    fn test_build_key_table_and_page_queries() {
        let q = build_key_table_query("_sqd_0_keys", &cols(&["id"]), "a", "EXCEPT", "b");
        assert_eq!(
            q,
            r#"CREATE TEMP TABLE "_sqd_0_keys" AS SELECT "id" FROM "a" EXCEPT SELECT "id" FROM "b" ORDER BY 1"#
        );
        let q = build_key_page_query("_sqd_0_keys", &cols(&["rowid", "k"]), "_rowid_");
        assert_eq!(
            q,
            r#"SELECT _rowid_, "rowid", "k" FROM "_sqd_0_keys" WHERE _rowid_ > ?1 ORDER BY _rowid_ LIMIT ?2"#
        );
    }

    #[test]
    fn test_build_lookup_query_is_null_safe() {
        let q = build_lookup_query("x", &cols(&["id", "v"]), &cols(&["id", "k"]), "rowid");
        assert_eq!(
            q,
            r#"SELECT "id", "v" FROM "x" WHERE "id" IS ?1 AND "k" IS ?2 ORDER BY rowid LIMIT 1"#
        );
    }

    #[test]
    fn test_build_duplicate_query() {
        let q = build_duplicate_query("x", &cols(&["k", "v"]), &cols(&["k"]), "rowid");
        assert!(q.starts_with(r#"SELECT x."k", x."v" FROM "x" AS x WHERE EXISTS"#), "{}", q);
        assert!(q.contains(r#"x."k" IS y."k" AND x.rowid <> y.rowid"#), "{}", q);
    }

    #[test]
    fn test_rowid_alias_skips_shadowed_names() {
        assert_eq!(rowid_alias(&cols(&["id", "v"])), Some("rowid"));
        assert_eq!(rowid_alias(&cols(&["ROWID", "v"])), Some("_rowid_"));
        assert_eq!(rowid_alias(&cols(&["rowid", "_rowid_"])), Some("oid"));
        assert_eq!(rowid_alias(&cols(&["rowid", "_rowid_", "OID"])), None);

        let q = build_duplicate_query("x", &cols(&["rowid", "k"]), &cols(&["k"]), "_rowid_");
        assert!(q.contains("x._rowid_ <> y._rowid_) ORDER BY x._rowid_"), "{}", q);
    }

    #[test]
    fn test_build_output_table_query() {
        let q = build_output_table_query(
            "t",
            "status",
            &[
                ("id".to_string(), "INTEGER".to_string()),
                ("v".to_string(), String::new()),
            ],
        );
        assert_eq!(q, r#"CREATE TABLE "t" ("status" TEXT, "id" INTEGER, "v")"#);
    }

    #[test]
    fn test_build_insert_query() {
        let q = build_insert_query("t", "status1", &["id".to_string(), "v".to_string()]);
        assert_eq!(
            q,
            r#"INSERT INTO "t" ("status1", "id", "v") VALUES (?1, ?2, ?3)"#
        );
    }
}
