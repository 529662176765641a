use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;

use crate::domain::error::DiffError;
use crate::infrastructure::db::sql_utils::{NEW_SCHEMA, OLD_SCHEMA};

/// Fail with [`DiffError::SourceNotFound`] unless `path` exists.
pub fn ensure_source(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DiffError::SourceNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Smallest page cache a single schema is given, in KiB.
const MIN_CACHE_KIB: u64 = 1024;

/// Page cache per open schema when `memory_mb` is shared by `schemas` of
/// them, in KiB. Never below 1 MiB, so tiny budgets may be exceeded.
pub fn cache_share_kib(memory_mb: u64, schemas: u64) -> u64 {
    (memory_mb.saturating_mul(1024) / schemas.max(1)).max(MIN_CACHE_KIB)
}

/// `PRAGMA [schema.]cache_size`; a negative size is read as KiB.
fn cache_pragma(schema: Option<&str>, cache_kib: u64) -> String {
    let target = schema.map(|s| format!("{s}.")).unwrap_or_default();
    format!("PRAGMA {}cache_size = -{}", target, cache_kib)
}

/// Open a read-only pool over one source database.
///
/// Every connection gets `cache_kib` of page cache.
pub async fn connect_source(path: &Path, cache_kib: u64, max_connections: u32) -> Result<SqlitePool> {
    ensure_source(path)?;

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true);

    let pragma = cache_pragma(None, cache_kib);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .after_connect(move |conn, _meta| {
            let pragma = pragma.clone();
            Box::pin(async move {
                sqlx::query(&pragma).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    debug!("Opened {} ({} connections, {} KiB cache each)", path.display(), max_connections, cache_kib);

    Ok(pool)
}

/// Open the pool the row differ works on.
///
/// Each connection has a private in-memory main database (temporary tables
/// live there) with the old and new sources attached as [`OLD_SCHEMA`] and
/// [`NEW_SCHEMA`], each with `cache_kib` of page cache. Source paths are
/// bound parameters of `ATTACH`.
pub async fn connect_differ(
    old: &Path,
    new: &Path,
    cache_kib: u64,
    max_connections: u32,
) -> Result<SqlitePool> {
    ensure_source(old)?;
    ensure_source(new)?;

    let old_path = old.display().to_string();
    let new_path = new.display().to_string();

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .after_connect(move |conn, _meta| {
            let old_path = old_path.clone();
            let new_path = new_path.clone();
            Box::pin(async move {
                sqlx::query(&format!("ATTACH DATABASE ?1 AS {OLD_SCHEMA}"))
                    .bind(old_path)
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("ATTACH DATABASE ?1 AS {NEW_SCHEMA}"))
                    .bind(new_path)
                    .execute(&mut *conn)
                    .await?;
                for schema in [OLD_SCHEMA, NEW_SCHEMA] {
                    sqlx::query(&cache_pragma(Some(schema), cache_kib))
                        .execute(&mut *conn)
                        .await?;
                }
                Ok(())
            })
        })
        .connect_with(SqliteConnectOptions::new())
        .await
        .context("Failed to open the diff workspace")?;

    debug!(
        "Attached {} as {} and {} as {}",
        old.display(),
        OLD_SCHEMA,
        new.display(),
        NEW_SCHEMA
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_pragma_uses_kib() {
        assert_eq!(cache_pragma(None, 1048576), "PRAGMA cache_size = -1048576");
        assert_eq!(
            cache_pragma(Some(OLD_SCHEMA), 2048),
            "PRAGMA src_old.cache_size = -2048"
        );
    }

    #[test]
    fn budget_is_split_across_schemas() {
        // 16 jobs: two source pools plus two attached schemas per differ connection
        assert_eq!(cache_share_kib(1024, 4 * 16), 16 * 1024);
        assert_eq!(cache_share_kib(1024, 1), 1024 * 1024);
        assert_eq!(cache_share_kib(1024, 0), 1024 * 1024);
        assert_eq!(cache_share_kib(8, 64), MIN_CACHE_KIB);
    }

    #[test]
    fn missing_source_is_typed() {
        let err = ensure_source(Path::new("/definitely/not/here.db")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::SourceNotFound { .. })
        ));
    }
}
