use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of sqlitediff's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                                  |
/// |---------|-----------------|----------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                     |
/// | `Info`  | `info`          | Default, shows per-table timings             |
/// | `Debug` | `debug`         | `--verbose`, shows SQL and scan progress too |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for sqlitediff.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Logs go
/// to stderr so that stdout only carries the report.
///
/// Call this **once** at application startup. Library consumers who manage
/// their own subscriber should skip this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "sqlitediff=error",
        LogLevel::Info => "sqlitediff=info",
        LogLevel::Debug => "sqlitediff=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::cancel::CancellationToken;
pub use application::monitoring::PerfReport;
pub use domain::comparison::{ComparisonReport, ReportRow, TableStatus};
pub use domain::error::DiffError;
pub use domain::fingerprint::{fingerprint, FingerprintMode};
pub use domain::run_report::{RunReport, Summary};
pub use domain::table_columns::TableColumns;
pub use domain::table_diff::{DiffRecord, DiffStatus, SqlValue, StatusCounts, TableDiff};
pub use domain::value_objects::{ColumnName, Fingerprint, TableName};
pub use infrastructure::config::{AppConfig, DiffConfig, OutputConfig};

use crate::application::diff::DiffService;
use crate::application::monitoring::{MonitoringCatalog, MonitoringDiffer};
use crate::domain::ports::TableCatalog;
use crate::infrastructure::db::catalog::{LoadOptions, SqliteCatalog};
use crate::infrastructure::db::client::{cache_share_kib, connect_differ, ensure_source};
use crate::infrastructure::db::output_store::LazyOutputStore;
use crate::infrastructure::db::row_differ::SqliteRowDiffer;

// ─── Public entry points ───

/// Compare `cfg.old_db` with `cfg.new_db` and, when any table is `NG`, write
/// the row-level differences to a fresh output store under `cfg.output.dir`.
///
/// Use [`run_with_timing`] if you also want a performance report.
pub async fn run(cfg: &AppConfig, token: &CancellationToken) -> Result<RunReport> {
    let (report, _) = run_with_timing(cfg, token).await?;
    Ok(report)
}

/// Same as [`run`], also returning per-operation timings.
pub async fn run_with_timing(
    cfg: &AppConfig,
    token: &CancellationToken,
) -> Result<(RunReport, PerfReport)> {
    cfg.validate()?;
    ensure_source(&cfg.old_db)?;
    ensure_source(&cfg.new_db)?;

    let perf = PerfReport::new();
    let jobs = u32::try_from(cfg.jobs()).unwrap_or(u32::MAX);
    let options = Arc::new(cfg.load_options());

    // two source pools plus two attached schemas per differ connection
    let cache_kib = cache_share_kib(cfg.diff.memory_mb, 4 * u64::from(jobs));

    let old_catalog = build_catalog(&cfg.old_db, cache_kib, jobs, &options, &perf).await?;
    let new_catalog = build_catalog(&cfg.new_db, cache_kib, jobs, &options, &perf).await?;

    let differ_pool = connect_differ(&cfg.old_db, &cfg.new_db, cache_kib, jobs).await?;
    let differ = Arc::new(MonitoringDiffer::new(
        Arc::new(SqliteRowDiffer::new(differ_pool)),
        Arc::clone(&perf),
    ));

    let service = DiffService::new(old_catalog, new_catalog, differ, cfg.jobs());
    let mut store = LazyOutputStore::new(&cfg.output.dir, &cfg.old_db);
    let comparison = service
        .run_diff(&cfg.ignored_tables(), &mut store, token)
        .await;

    let output_path = store.finish().await;
    let comparison = comparison?;
    if output_path.is_none() {
        info!("no table differs, no output store written");
    }

    let report = RunReport::new(
        &cfg.old_db.display().to_string(),
        &cfg.new_db.display().to_string(),
        comparison,
        output_path.map(|p| p.display().to_string()),
    );

    let perf = perf
        .lock()
        .map(|p| p.clone())
        .map_err(|_| anyhow!("performance report lock poisoned"))?;
    Ok((report, perf))
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Open one source and wrap its catalog in the monitoring decorator.
///
/// The shared `perf` accumulates timings from both catalogs and the differ,
/// giving a unified view of the run.
async fn build_catalog(
    path: &Path,
    cache_kib: u64,
    jobs: u32,
    options: &Arc<LoadOptions>,
    perf: &Arc<Mutex<PerfReport>>,
) -> Result<Arc<dyn TableCatalog>> {
    let catalog = SqliteCatalog::open(path, cache_kib, jobs, Arc::clone(options)).await?;
    Ok(Arc::new(MonitoringCatalog::new(
        Arc::new(catalog),
        Arc::clone(perf),
    )))
}
