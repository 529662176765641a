use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::domain::comparison::ChangedTablePair;
use crate::domain::error::DiffError;
use crate::domain::ports::RowDiffer;
use crate::domain::table_diff::{format_key, status_column_name, DiffRecord, DiffStatus, SqlValue, TableDiff};
use crate::domain::value_objects::{ColumnName, Side};
use crate::infrastructure::db::row_mapper::{bind_all, row_to_values, values_from};
use crate::infrastructure::db::sql_utils::{
    build_duplicate_query, build_except_table_query, build_key_page_query, build_key_table_query,
    build_lookup_query, qualified, quote_ident, rowid_alias, NEW_SCHEMA, OLD_SCHEMA,
};

/// Keys read back per page of a key set.
const KEY_PAGE: i64 = 1_000;

/// Row differ over a pool whose connections have both sources attached
/// (see [`connect_differ`](crate::infrastructure::db::client::connect_differ)).
pub struct SqliteRowDiffer {
    pool: SqlitePool,
}

impl SqliteRowDiffer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowDiffer for SqliteRowDiffer {
    async fn diff_table(&self, pair: &ChangedTablePair) -> Result<TableDiff> {
        let work = TableWork::new(pair)?;

        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire a diff connection")?;

        work.create_transient_sets(&mut conn).await?;
        let result = work.classify(&mut conn).await;
        work.drop_transient_sets(&mut conn).await?;

        let records = result?;
        debug!(table = %pair.name(), records = records.len(), "row diff done");

        Ok(TableDiff {
            table_name: pair.name().to_string(),
            status_column: status_column_name(&work.column_names()),
            columns: work.column_names(),
            records,
        })
    }
}

/// State of one table diff: names of the transient tables plus the column
/// lists every step needs.
struct TableWork<'a> {
    pair: &'a ChangedTablePair,
    old_tmp: String,
    new_tmp: String,
    keys_tmp: String,
    columns: Vec<ColumnName>,
    key: Vec<ColumnName>,
    /// Unshadowed rowid name of the changed-row tables.
    rowid: &'static str,
    /// Unshadowed rowid name of the key table.
    key_rowid: &'static str,
}

impl<'a> TableWork<'a> {
    fn new(pair: &'a ChangedTablePair) -> Result<Self> {
        let columns: Vec<ColumnName> = pair.old.column_names().cloned().collect();
        let key = pair.old.effective_key().columns;
        let no_rowid = || anyhow!("{} uses every rowid alias as a column name", pair.name());

        Ok(Self {
            pair,
            old_tmp: format!("_sqd_{}_old", pair.index),
            new_tmp: format!("_sqd_{}_new", pair.index),
            keys_tmp: format!("_sqd_{}_keys", pair.index),
            rowid: rowid_alias(&columns).ok_or_else(no_rowid)?,
            key_rowid: rowid_alias(&key).ok_or_else(no_rowid)?,
            columns,
            key,
        })
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.0.clone()).collect()
    }

    fn table(&self) -> &str {
        self.pair.name()
    }

    async fn create_transient_sets(&self, conn: &mut PoolConnection<Sqlite>) -> Result<()> {
        let old = qualified(OLD_SCHEMA, self.table());
        let new = qualified(NEW_SCHEMA, self.table());

        for (tmp, from, minus) in [(&self.old_tmp, &old, &new), (&self.new_tmp, &new, &old)] {
            drop_temp(conn, tmp).await?;
            let query = build_except_table_query(tmp, &self.columns, from, minus);
            debug!("Executing: {}", query);
            sqlx::query(&query)
                .execute(&mut **conn)
                .await
                .with_context(|| format!("Failed to build changed rows of {}", self.table()))?;
        }
        Ok(())
    }

    async fn drop_transient_sets(&self, conn: &mut PoolConnection<Sqlite>) -> Result<()> {
        for tmp in [&self.old_tmp, &self.new_tmp, &self.keys_tmp] {
            drop_temp(conn, tmp).await?;
        }
        Ok(())
    }

    async fn classify(&self, conn: &mut PoolConnection<Sqlite>) -> Result<Vec<DiffRecord>> {
        let mut records = Vec::new();

        if self.pair.old.unique_override.is_some() {
            for (tmp, status) in [
                (&self.old_tmp, DiffStatus::DuplicateOld),
                (&self.new_tmp, DiffStatus::DuplicateNew),
            ] {
                let query = build_duplicate_query(tmp, &self.columns, &self.key, self.rowid);
                let mut rows = sqlx::query(&query).fetch(&mut **conn);
                while let Some(row) = rows.try_next().await? {
                    records.push(DiffRecord::new(status, row_to_values(&row)?));
                }
            }
        }

        let mut keys = self.key_pages(conn, &self.old_tmp, "EXCEPT", &self.new_tmp).await?;
        while let Some(page) = keys.next(conn).await? {
            for key in page {
                let values = self.lookup(conn, Side::Old, &key).await?;
                records.push(DiffRecord::new(DiffStatus::Deleted, values));
            }
        }

        let mut keys = self.key_pages(conn, &self.new_tmp, "EXCEPT", &self.old_tmp).await?;
        while let Some(page) = keys.next(conn).await? {
            for key in page {
                let values = self.lookup(conn, Side::New, &key).await?;
                records.push(DiffRecord::new(DiffStatus::Inserted, values));
            }
        }

        let compared = self.compared_positions();
        let mut keys = self.key_pages(conn, &self.old_tmp, "INTERSECT", &self.new_tmp).await?;
        while let Some(page) = keys.next(conn).await? {
            for key in page {
                let old = self.lookup(conn, Side::Old, &key).await?;
                let new = self.lookup(conn, Side::New, &key).await?;
                if compared.iter().any(|&i| !old[i].same_as(&new[i])) {
                    records.push(DiffRecord::new(DiffStatus::UpdatedOld, old));
                    records.push(DiffRecord::new(DiffStatus::UpdatedNew, new));
                }
            }
        }

        Ok(records)
    }

    /// Positions (in `columns`) of the columns the update check looks at.
    fn compared_positions(&self) -> Vec<usize> {
        let ignored = &self.pair.old.ignored_columns;
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !ignored.contains(c.as_str()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Store the key set `a <op> b` in the key table, replacing the previous
    /// one, and return a reader over it.
    async fn key_pages(
        &self,
        conn: &mut PoolConnection<Sqlite>,
        a: &str,
        op: &str,
        b: &str,
    ) -> Result<KeyPages> {
        drop_temp(conn, &self.keys_tmp).await?;
        let query = build_key_table_query(&self.keys_tmp, &self.key, a, op, b);
        debug!("Executing: {}", query);
        sqlx::query(&query)
            .execute(&mut **conn)
            .await
            .with_context(|| format!("Failed to collect keys of {}", self.table()))?;

        Ok(KeyPages {
            query: build_key_page_query(&self.keys_tmp, &self.key, self.key_rowid),
            after: 0,
            done: false,
        })
    }

    async fn lookup(
        &self,
        conn: &mut PoolConnection<Sqlite>,
        side: Side,
        key: &[SqlValue],
    ) -> Result<Vec<SqlValue>> {
        let tmp = match side {
            Side::Old => &self.old_tmp,
            Side::New => &self.new_tmp,
        };
        let query = build_lookup_query(tmp, &self.columns, &self.key, self.rowid);
        let row = bind_all(sqlx::query(&query), key)
            .fetch_optional(&mut **conn)
            .await?;

        match row {
            Some(row) => row_to_values(&row),
            None => Err(DiffError::KeyLookupMiss {
                table: self.table().to_string(),
                side,
                key: format_key(key),
            }
            .into()),
        }
    }
}

/// Reader over a key table, [`KEY_PAGE`] keys at a time in rowid order.
struct KeyPages {
    query: String,
    after: i64,
    done: bool,
}

impl KeyPages {
    async fn next(&mut self, conn: &mut PoolConnection<Sqlite>) -> Result<Option<Vec<Vec<SqlValue>>>> {
        if self.done {
            return Ok(None);
        }
        let rows = sqlx::query(&self.query)
            .bind(self.after)
            .bind(KEY_PAGE)
            .fetch_all(&mut **conn)
            .await?;
        self.done = (rows.len() as i64) < KEY_PAGE;

        let Some(last) = rows.last() else {
            return Ok(None);
        };
        self.after = last.try_get::<i64, _>(0)?;
        let keys: Vec<Vec<SqlValue>> = rows.iter().map(|row| values_from(row, 1)).collect::<Result<_>>()?;
        Ok(Some(keys))
    }
}

async fn drop_temp(conn: &mut PoolConnection<Sqlite>, table: &str) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS temp.{}", quote_ident(table)))
        .execute(&mut **conn)
        .await
        .with_context(|| format!("Failed to drop {}", table))?;
    Ok(())
}
