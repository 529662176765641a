use anyhow::Result;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};

use crate::domain::table_diff::SqlValue;

/// Convert a `SqliteRow` into its cell values, in select-list order.
///
/// The variant follows the storage class of each value, not the declared
/// column type, so a TEXT stored in an INTEGER column stays TEXT.
pub fn row_to_values(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    values_from(row, 0)
}

/// Like [`row_to_values`], skipping the first `first` columns.
pub fn values_from(row: &SqliteRow, first: usize) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.len().saturating_sub(first));
    for idx in first..row.len() {
        values.push(decode_column(row, idx)?);
    }
    Ok(values)
}

fn decode_column(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();

    let v = match type_name.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
            SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" => SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // TEXT, and anything else SQLite hands back as text
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(v)
}

/// Bind one value as the next positional parameter.
pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    }
}

/// Bind every value of `values`, in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}
