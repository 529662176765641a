use crate::application::cancel::CancellationToken;
use crate::domain::comparison::ChangedTablePair;
use crate::domain::ports::{Catalog, RowDiffer, TableCatalog};
use crate::domain::table_diff::TableDiff;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Operation name: "load_catalog" or "diff_table".
    pub operation: &'static str,
    /// Database label (catalog loads) or table name (diffs).
    pub target: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Rows scanned while fingerprinting, or records emitted by a diff.
    pub rows: u64,
}

/// Accumulated performance timings for a single run.
///
/// Shared across all decorator instances for one run via `Arc<Mutex<_>>`.
/// After the run, pass to [`crate::presentation::cli_summary::print_perf_summary`]
/// to render a human-readable table.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_scanned: u64,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if timing.operation == "load_catalog" {
                r.total_rows_scanned += timing.rows;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringCatalog ───────────────────────────────────────────────────────

/// Decorator: wraps any `TableCatalog`, measures wall time per `load` call,
/// and appends the result to the shared `PerfReport`.
pub struct MonitoringCatalog {
    inner: Arc<dyn TableCatalog>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringCatalog {
    pub fn new(inner: Arc<dyn TableCatalog>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

#[async_trait]
impl TableCatalog for MonitoringCatalog {
    fn label(&self) -> &str {
        self.inner.label()
    }

    #[instrument(
        name = "load_catalog",
        skip(self, token),
        fields(db.path = %self.inner.label()),
        level = "info"
    )]
    async fn load(&self, token: &CancellationToken) -> Result<Catalog> {
        let start = Instant::now();
        let catalog = self.inner.load(token).await?;
        let duration_ms = start.elapsed().as_millis();

        let rows: u64 = catalog.values().map(|t| t.row_count).sum();
        info!(db = %self.inner.label(), tables = catalog.len(), rows, duration_ms, "load_catalog completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "load_catalog",
                target: self.inner.label().to_string(),
                duration_ms,
                rows,
            },
        );

        Ok(catalog)
    }
}

// ─── MonitoringDiffer ────────────────────────────────────────────────────────

/// Decorator: wraps any `RowDiffer`, measures wall time per `diff_table` call,
/// and appends the result to the shared `PerfReport`.
pub struct MonitoringDiffer {
    inner: Arc<dyn RowDiffer>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringDiffer {
    pub fn new(inner: Arc<dyn RowDiffer>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

#[async_trait]
impl RowDiffer for MonitoringDiffer {
    #[instrument(
        name = "diff_table",
        skip(self, pair),
        fields(
            db.table = %pair.name(),
            old.rows = pair.old.row_count,
            new.rows = pair.new.row_count,
        ),
        level = "info"
    )]
    async fn diff_table(&self, pair: &ChangedTablePair) -> Result<TableDiff> {
        let start = Instant::now();
        let result = self.inner.diff_table(pair).await?;
        let duration_ms = start.elapsed().as_millis();

        let counts = result.counts();
        info!(
            table = %pair.name(),
            inserted = counts.inserted,
            deleted = counts.deleted,
            updated = counts.updated,
            duplicates = counts.duplicate_old + counts.duplicate_new,
            duration_ms,
            "diff_table completed"
        );

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "diff_table",
                target: pair.name().to_string(),
                duration_ms,
                rows: result.records.len() as u64,
            },
        );

        Ok(result)
    }
}
