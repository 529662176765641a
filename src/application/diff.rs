use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::cancel::CancellationToken;
use crate::application::compare::compare;
use crate::domain::{
    comparison::{ChangedTablePair, ComparisonReport},
    ports::{DiffSink, RowDiffer, TableCatalog},
    table_diff::TableDiff,
};

// ─── Diff Service ───

pub struct DiffService {
    old_catalog: Arc<dyn TableCatalog>,
    new_catalog: Arc<dyn TableCatalog>,
    differ: Arc<dyn RowDiffer>,
    workers: usize,
}

impl DiffService {
    pub fn new(
        old_catalog: Arc<dyn TableCatalog>,
        new_catalog: Arc<dyn TableCatalog>,
        differ: Arc<dyn RowDiffer>,
        workers: usize,
    ) -> Self {
        Self {
            old_catalog,
            new_catalog,
            differ,
            workers: workers.max(1),
        }
    }

    /// Load both catalogs, classify every table, then diff the changed ones.
    ///
    /// `workers` tasks diff tables concurrently and hand each finished
    /// [`TableDiff`] to `sink` through a bounded channel, so at most
    /// `2 * workers` table diffs are held in memory at once. The sink is only
    /// called for `NG` tables, one at a time, in completion order.
    pub async fn run_diff(
        &self,
        ignored_tables: &HashSet<String>,
        sink: &mut dyn DiffSink,
        token: &CancellationToken,
    ) -> Result<ComparisonReport> {
        let (old, new) = tokio::join!(
            self.old_catalog.load(token),
            self.new_catalog.load(token)
        );
        let (old, new) = (old?, new?);

        let (mut report, changed) = compare(&old, &new, ignored_tables);
        info!(
            tables = report.rows.len(),
            changed = changed.len(),
            "table comparison completed"
        );

        let workers = self.workers.min(changed.len());
        let queue = Arc::new(Mutex::new(changed.into_iter()));
        let (tx, mut rx) = mpsc::channel::<(ChangedTablePair, TableDiff)>(workers.max(1));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let differ = Arc::clone(&self.differ);
            let token = token.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue
                        .lock()
                        .map_err(|_| anyhow!("table queue lock poisoned"))?
                        .next();
                    let Some(pair) = next else { break };

                    token.checkpoint()?;
                    let diff = differ.diff_table(&pair).await?;
                    if tx.send((pair, diff)).await.is_err() {
                        // writer gave up, its error is reported instead
                        break;
                    }
                }
                Ok::<_, anyhow::Error>(())
            }));
        }
        drop(tx);

        let mut written = Ok(());
        while let Some((pair, diff)) = rx.recv().await {
            report.set_changes(pair.name(), diff.counts());
            written = match token.checkpoint() {
                Ok(()) => sink.write_table(&pair, &diff).await,
                Err(e) => Err(e.into()),
            };
            if written.is_err() {
                break;
            }
            debug!(table = %pair.name(), "table diff handed over");
        }
        drop(rx);

        for h in handles {
            h.await??;
        }
        written?;

        Ok(report)
    }
}
