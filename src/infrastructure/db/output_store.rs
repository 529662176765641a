use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::comparison::ChangedTablePair;
use crate::domain::ports::DiffSink;
use crate::domain::table_def::TableDefinition;
use crate::domain::table_diff::TableDiff;
use crate::infrastructure::db::row_mapper::bind_all;
use crate::infrastructure::db::sql_utils::{build_insert_query, build_output_table_query};

/// SQLite file receiving one table per changed source table.
pub struct OutputStore {
    path: PathBuf,
    pool: SqlitePool,
}

impl OutputStore {
    /// First free name among `<stem>_diff.db`, `<stem>_diff1.db`, … in `dir`,
    /// where `<stem>` is the old database's file name without extension.
    pub fn next_available_path(dir: &Path, source_old: &Path) -> PathBuf {
        let stem = source_old
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sqlitediff".to_string());

        let mut n = 0usize;
        loop {
            let name = if n == 0 {
                format!("{stem}_diff.db")
            } else {
                format!("{stem}_diff{n}.db")
            };
            let candidate = dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Create a fresh output store in `dir` (created if needed).
    pub async fn create(dir: &Path, source_old: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let path = Self::next_available_path(dir, source_old);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        // single writer: tables are written one after another
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to create output store {}", path.display()))?;

        info!(path = %path.display(), "output store created");
        Ok(Self { path, pool })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the output table for `def` and insert every record of `diff`,
    /// all inside one transaction.
    pub async fn write_table(&self, def: &TableDefinition, diff: &TableDiff) -> Result<()> {
        let columns: Vec<(String, String)> = def
            .columns
            .iter()
            .map(|c| (c.name.0.clone(), c.decl_type.clone()))
            .collect();

        let mut tx = self.pool.begin().await?;

        let create = build_output_table_query(&diff.table_name, &diff.status_column, &columns);
        debug!("Executing: {}", create);
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to create output table {}", diff.table_name))?;

        let insert = build_insert_query(&diff.table_name, &diff.status_column, &diff.columns);
        for record in &diff.records {
            let query = sqlx::query(&insert).bind(record.status.as_str());
            bind_all(query, &record.values)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to write a row of {}", diff.table_name))?;
        }

        tx.commit().await?;
        debug!(table = %diff.table_name, rows = diff.records.len(), "output table written");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Output store created on the first table handed to it, so runs without
/// any `NG` table leave no file behind.
pub struct LazyOutputStore {
    dir: PathBuf,
    source_old: PathBuf,
    store: Option<OutputStore>,
}

impl LazyOutputStore {
    pub fn new(dir: &Path, source_old: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            source_old: source_old.to_path_buf(),
            store: None,
        }
    }

    /// Close the store and return its path; `None` when nothing was written.
    pub async fn finish(self) -> Option<PathBuf> {
        let store = self.store?;
        let path = store.path().to_path_buf();
        store.close().await;
        Some(path)
    }
}

#[async_trait]
impl DiffSink for LazyOutputStore {
    async fn write_table(&mut self, pair: &ChangedTablePair, diff: &TableDiff) -> Result<()> {
        let store = match self.store.take() {
            Some(store) => store,
            None => OutputStore::create(&self.dir, &self.source_old).await?,
        };
        let written = store.write_table(&pair.old, diff).await;
        self.store = Some(store);
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_skip_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = Path::new("/data/old.sqlite");

        let first = OutputStore::next_available_path(dir.path(), source);
        assert_eq!(first, dir.path().join("old_diff.db"));

        std::fs::write(&first, b"").unwrap();
        let second = OutputStore::next_available_path(dir.path(), source);
        assert_eq!(second, dir.path().join("old_diff1.db"));

        std::fs::write(&second, b"").unwrap();
        assert_eq!(
            OutputStore::next_available_path(dir.path(), source),
            dir.path().join("old_diff2.db")
        );
    }
}
