use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::cancel::CancellationToken;
use crate::domain::error::DiffError;
use crate::domain::fingerprint::{FingerprintBuilder, FingerprintMode};
use crate::domain::ports::{Catalog, TableCatalog};
use crate::domain::table_columns::TableColumns;
use crate::domain::table_def::TableDefinition;
use crate::domain::value_objects::{ColumnDef, ColumnName, Fingerprint, IgnoredColumns, TableName};
use crate::infrastructure::db::client::connect_source;
use crate::infrastructure::db::row_mapper::row_to_values;
use crate::infrastructure::db::schema_text::parse_definition;
use crate::infrastructure::db::sql_utils::build_fingerprint_query;

const PROGRESS_EVERY: u64 = 10_000;

/// Per-run settings that shape every `TableDefinition` of a catalog.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Columns ignored in every table.
    pub ignore: Vec<String>,
    pub ignore_table_columns: TableColumns,
    pub unique: TableColumns,
    pub fingerprint_mode: FingerprintMode,
}

/// Catalog of one SQLite file, read through a read-only pool.
pub struct SqliteCatalog {
    label: String,
    pool: SqlitePool,
    options: Arc<LoadOptions>,
}

impl SqliteCatalog {
    pub fn new(label: impl Into<String>, pool: SqlitePool, options: Arc<LoadOptions>) -> Self {
        Self {
            label: label.into(),
            pool,
            options,
        }
    }

    /// Open `path` read-only with `max_connections` workers, each with
    /// `cache_kib` of page cache, and wrap it.
    pub async fn open(
        path: &Path,
        cache_kib: u64,
        max_connections: u32,
        options: Arc<LoadOptions>,
    ) -> Result<Self> {
        let pool = connect_source(path, cache_kib, max_connections).await?;
        Ok(Self::new(path.display().to_string(), pool, options))
    }
}

#[async_trait]
impl TableCatalog for SqliteCatalog {
    fn label(&self) -> &str {
        &self.label
    }

    async fn load(&self, token: &CancellationToken) -> Result<Catalog> {
        let tables: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list tables of {}", self.label))?;

        debug!(db = %self.label, tables = tables.len(), "enumerated tables");

        let mut handles = Vec::with_capacity(tables.len());

        for (name, sql) in tables {
            let pool = self.pool.clone();
            let options = Arc::clone(&self.options);
            let token = token.clone();

            let handle = tokio::spawn(async move {
                token.checkpoint()?;
                load_table(&pool, name, sql.unwrap_or_default(), &options).await
            });

            handles.push(handle);
        }

        let mut catalog = Catalog::new();
        for h in handles {
            let def = h.await??;
            catalog.insert(def.name.0.clone(), def);
        }

        Ok(catalog)
    }
}

async fn load_table(
    pool: &SqlitePool,
    name: String,
    raw_definition: String,
    options: &LoadOptions,
) -> Result<TableDefinition> {
    let (columns, primary_key) = describe_table(pool, &name, &raw_definition).await?;
    if columns.is_empty() {
        warn!(table = %name, "schema parse anomaly: no columns found, table will not be fingerprinted");
    }

    let ignored_columns: IgnoredColumns = options
        .ignore
        .iter()
        .chain(options.ignore_table_columns.get(&name).unwrap_or_default())
        .cloned()
        .collect();

    let unique_override = match options.unique.get(&name) {
        Some(cols) => Some(resolve_override(&name, &columns, cols)?),
        None => None,
    };

    let mut def = TableDefinition {
        name: TableName(name),
        columns,
        primary_key,
        unique_override,
        ignored_columns,
        raw_definition,
        fingerprint: None,
        row_count: 0,
    };

    let compared = def.compared_columns();
    if def.columns.is_empty() {
        // nothing to scan
    } else if compared.is_empty() {
        info!(table = %def.name, "all columns ignored, no fingerprint");
    } else {
        let (fingerprint, rows) =
            scan_fingerprint(pool, &def.name.0, &compared, options.fingerprint_mode).await?;
        if fingerprint.is_none() {
            debug!(table = %def.name, "no rows");
        }
        def.fingerprint = fingerprint;
        def.row_count = rows;
    }

    Ok(def)
}

/// Columns (declaration order) and primary key (key order) of `table`.
///
/// Uses SQLite's own introspection; the `CREATE TABLE` text is parsed only
/// when introspection reports no column at all.
async fn describe_table(
    pool: &SqlitePool,
    table: &str,
    raw_definition: &str,
) -> Result<(Vec<ColumnDef>, Vec<ColumnName>)> {
    let info: Vec<(String, Option<String>, i64)> =
        sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to introspect table {}", table))?;

    if info.is_empty() {
        let parsed = parse_definition(raw_definition);
        return Ok((parsed.columns, parsed.primary_key));
    }

    let mut key: Vec<(i64, ColumnName)> = info
        .iter()
        .filter(|(_, _, pk)| *pk > 0)
        .map(|(name, _, pk)| (*pk, ColumnName(name.clone())))
        .collect();
    key.sort_by_key(|(pos, _)| *pos);

    let columns = info
        .into_iter()
        .map(|(name, decl_type, _)| ColumnDef::new(name, decl_type.unwrap_or_default()))
        .collect();

    Ok((columns, key.into_iter().map(|(_, c)| c).collect()))
}

/// Check every configured key column against the table's real columns.
fn resolve_override(table: &str, columns: &[ColumnDef], cols: &[String]) -> Result<Vec<ColumnName>> {
    cols.iter()
        .map(|c| {
            if columns.iter().any(|d| d.name.as_str() == c) {
                Ok(ColumnName(c.clone()))
            } else {
                Err(DiffError::UnknownColumn {
                    table: table.to_string(),
                    column: c.clone(),
                }
                .into())
            }
        })
        .collect()
}

/// Stream every row ordered by `cols` into one fingerprint.
async fn scan_fingerprint(
    pool: &SqlitePool,
    table: &str,
    cols: &[ColumnName],
    mode: FingerprintMode,
) -> Result<(Option<Fingerprint>, u64)> {
    let query = build_fingerprint_query(table, cols);
    debug!("Executing: {}", query);

    let mut builder = FingerprintBuilder::new(mode);
    let mut rows = sqlx::query(&query).fetch(pool);
    while let Some(row) = rows
        .try_next()
        .await
        .with_context(|| format!("Failed to scan {}", table))?
    {
        builder.push_row(&row_to_values(&row)?);
        if builder.rows() % PROGRESS_EVERY == 0 {
            debug!(table, rows = builder.rows(), "fingerprinting");
        }
    }

    let count = builder.rows();
    Ok((builder.finish(), count))
}
