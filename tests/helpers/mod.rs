#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sqlitediff::infrastructure::db::row_mapper::row_to_values;
use sqlitediff::{AppConfig, DiffConfig, OutputConfig, SqlValue};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;

/// Create (or extend) a SQLite file by running `statements` in order.
pub async fn create_db(path: &Path, statements: &[&str]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
}

pub fn old_path(dir: &TempDir) -> PathBuf {
    dir.path().join("old.db")
}

pub fn new_path(dir: &TempDir) -> PathBuf {
    dir.path().join("new.db")
}

pub fn output_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("out")
}

/// Build both databases and a config pointing at them.
pub async fn setup(dir: &TempDir, old: &[&str], new: &[&str]) -> AppConfig {
    create_db(&old_path(dir), old).await;
    create_db(&new_path(dir), new).await;
    AppConfig {
        old_db: old_path(dir),
        new_db: new_path(dir),
        diff: DiffConfig {
            memory_mb: 8,
            jobs: Some(2),
            ..Default::default()
        },
        output: OutputConfig {
            dir: output_dir(dir),
            report: None,
        },
    }
}

/// Every row of `table` in an output store: (status, source values).
pub async fn read_output(path: &str, table: &str) -> Vec<(String, Vec<SqlValue>)> {
    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    let query = format!("SELECT * FROM \"{}\" ORDER BY _rowid_", table.replace('"', "\"\""));
    let rows = sqlx::query(&query).fetch_all(&mut conn).await.unwrap();
    conn.close().await.unwrap();

    rows.iter()
        .map(|row| {
            let mut values = row_to_values(row).unwrap();
            let status = match values.remove(0) {
                SqlValue::Text(s) => s,
                other => panic!("status column holds {other:?}"),
            };
            (status, values)
        })
        .collect()
}

/// Column names of an output table, in order.
pub async fn output_columns(path: &str, table: &str) -> Vec<String> {
    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    let names: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut conn)
            .await
            .unwrap();
    conn.close().await.unwrap();
    names.into_iter().map(|(n,)| n).collect()
}

pub fn int(i: i64) -> SqlValue {
    SqlValue::Integer(i)
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}
