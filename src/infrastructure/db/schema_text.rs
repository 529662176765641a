//! Column and primary-key extraction from `CREATE TABLE` text.
//!
//! Only used when `pragma_table_info` reports nothing for a table; favours
//! tolerance over full SQL grammar coverage.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::value_objects::{ColumnDef, ColumnName};

static PRIMARY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]*)\)").expect("valid primary key regex"));

static INLINE_PRIMARY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPRIMARY\s+KEY\b").expect("valid inline primary key regex"));

/// Leading identifier of a column definition: `[col]`, `"col"`, `` `col` `` or bare.
static COLUMN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:\[([^\]]+)\]|"((?:[^"]|"")+)"|`([^`]+)`|([A-Za-z_][A-Za-z0-9_$]*))\s*(.*)$"#)
        .expect("valid column name regex")
});

const TABLE_CONSTRAINTS: [&str; 5] = ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

const COLUMN_CONSTRAINTS: [&str; 11] = [
    "CONSTRAINT", "PRIMARY", "NOT", "NULL", "UNIQUE", "CHECK", "DEFAULT", "COLLATE", "REFERENCES",
    "GENERATED", "AS",
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedDefinition {
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<ColumnName>,
}

pub fn parse_definition(sql: &str) -> ParsedDefinition {
    let flat = sql.replace(['\n', '\r'], " ");
    let Some(body) = table_body(&flat) else {
        return ParsedDefinition::default();
    };

    let mut parsed = ParsedDefinition::default();
    for item in split_top_level(body) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let first_word = item
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        let first_word = first_word.split('(').next().unwrap_or_default();

        if TABLE_CONSTRAINTS.contains(&first_word) {
            if let Some(cap) = PRIMARY_KEY_RE.captures(item) {
                parsed.primary_key = cap[1].split(',').filter_map(key_column).collect();
            }
            continue;
        }

        let Some(cap) = COLUMN_NAME_RE.captures(item) else {
            continue;
        };
        let name = cap
            .get(1)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| m.as_str().to_string())
            .or_else(|| cap.get(2).map(|m| m.as_str().replace("\"\"", "\"")))
            .unwrap_or_default();
        let rest = cap.get(5).map(|m| m.as_str()).unwrap_or_default();

        if parsed.primary_key.is_empty() && INLINE_PRIMARY_KEY_RE.is_match(rest) {
            parsed.primary_key.push(ColumnName(name.clone()));
        }
        parsed.columns.push(ColumnDef::new(name, declared_type(rest)));
    }
    parsed
}

/// Text between the first `(` and its matching `)`.
fn table_body(sql: &str) -> Option<&str> {
    let start = sql.find('(')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in sql[start..].char_indices() {
        match (quote, ch) {
            (Some('['), ']') => quote = None,
            (Some(q), c) if q != '[' && c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`' | '[') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(&sql[start + 1..start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut last = 0;
    for (i, ch) in body.char_indices() {
        match (quote, ch) {
            (Some('['), ']') => quote = None,
            (Some(q), c) if q != '[' && c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`' | '[') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&body[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[last..]);
    parts
}

fn declared_type(rest: &str) -> String {
    rest.split_whitespace()
        .take_while(|w| {
            let upper = w.to_ascii_uppercase();
            !COLUMN_CONSTRAINTS.contains(&upper.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One entry of a `PRIMARY KEY(...)` list, unquoted, without ASC/DESC/COLLATE.
fn key_column(entry: &str) -> Option<ColumnName> {
    let cap = COLUMN_NAME_RE.captures(entry.trim())?;
    let name = cap
        .get(1)
        .or_else(|| cap.get(3))
        .or_else(|| cap.get(4))
        .map(|m| m.as_str().to_string())
        .or_else(|| cap.get(2).map(|m| m.as_str().replace("\"\"", "\"")))?;
    Some(ColumnName(name))
}
