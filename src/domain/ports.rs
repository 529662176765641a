use crate::application::cancel::CancellationToken;
use crate::domain::{
    comparison::ChangedTablePair, run_report::RunReport, table_def::TableDefinition,
    table_diff::TableDiff,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Map of table name to definition for one database.
pub type Catalog = BTreeMap<String, TableDefinition>;

/// Port: table enumeration, introspection and fingerprinting of one database
/// (implemented by SqliteCatalog)
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Human-readable location of the database, for logs.
    fn label(&self) -> &str;

    async fn load(&self, token: &CancellationToken) -> Result<Catalog>;
}

/// Port: row-level diff of one changed table (implemented by SqliteRowDiffer)
#[async_trait]
pub trait RowDiffer: Send + Sync {
    async fn diff_table(&self, pair: &ChangedTablePair) -> Result<TableDiff>;
}

/// Port: destination of finished table diffs (implemented by LazyOutputStore)
#[async_trait]
pub trait DiffSink: Send {
    async fn write_table(&mut self, pair: &ChangedTablePair, diff: &TableDiff) -> Result<()>;
}

/// Port: report formatting (implemented by JsonWriter, HtmlWriter)
pub trait OutputWriter: Send + Sync {
    /// Serializes the report to a string (JSON, HTML)
    fn format(&self, report: &RunReport) -> Result<String>;
    /// Extension of the produced file (e.g. "json", "html")
    fn extension(&self) -> &'static str;
}
