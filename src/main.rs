use anyhow::{anyhow, Result};
use clap::Parser;
use sqlitediff::presentation::cli_summary::{
    print_elapsed, print_output_location, print_perf_summary, print_report,
};
use sqlitediff::presentation::writers::{write_to_file, writer_for};
use sqlitediff::{init_tracing, AppConfig, CancellationToken, FingerprintMode, LogLevel, TableColumns};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "sqlitediff",
    about = "Compare two SQLite databases table by table and write the differing rows to a new SQLite file."
)]
struct Cli {
    /// Database compared as "old".
    old_db: PathBuf,

    /// Database compared as "new".
    new_db: PathBuf,

    /// Total page cache, in megabytes, split evenly across every source
    /// connection (at least 1 MB each) [default: 1024].
    #[arg(long, value_name = "MB")]
    memory: Option<u64>,

    /// Columns ignored in every table.
    #[arg(long, num_args = 1.., value_name = "COLUMN")]
    ignore: Vec<String>,

    /// Tables excluded from row-level diffing.
    #[arg(long = "ignore-tbl", num_args = 1.., value_name = "TABLE")]
    ignore_tbl: Vec<String>,

    /// Columns ignored in one table, as `table:col[,col...]`.
    #[arg(long = "ignore-tbl-col", num_args = 1.., value_name = "TABLE:COLS")]
    ignore_tbl_col: Vec<String>,

    /// Key used instead of the primary key, as `table:col[,col...]`.
    #[arg(long, num_args = 1.., value_name = "TABLE:COLS")]
    unique: Vec<String>,

    /// Directory receiving the output store [default: .].
    #[arg(long = "output-path", value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Print nothing to stdout. The output store is still written.
    #[arg(long)]
    silent: bool,

    /// TOML file supplying any of the settings above.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write a report file next to the output store.
    #[arg(long, value_parser = ["json", "html"])]
    report: Option<String>,

    /// How rows are folded into a table fingerprint: ordered or multiset.
    #[arg(long)]
    fingerprint: Option<FingerprintMode>,

    /// Maximum number of concurrent workers.
    #[arg(long)]
    jobs: Option<usize>,

    /// Log SQL statements and scan progress; print timings.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }

    /// Config file (if any) overlaid with flags: lists extend, scalars replace.
    fn into_config(self) -> Result<AppConfig> {
        let mut cfg = AppConfig::load(self.config.as_deref())?;

        cfg.old_db = self.old_db;
        cfg.new_db = self.new_db;

        if let Some(mb) = self.memory {
            cfg.diff.memory_mb = mb;
        }
        cfg.diff.ignore.extend(self.ignore);
        cfg.diff.ignore_tables.extend(self.ignore_tbl);
        cfg.diff
            .ignore_table_columns
            .merge(TableColumns::parse(&self.ignore_tbl_col)?);
        cfg.diff.unique.merge(TableColumns::parse(&self.unique)?);
        if let Some(mode) = self.fingerprint {
            cfg.diff.fingerprint = mode;
        }
        if self.jobs.is_some() {
            cfg.diff.jobs = self.jobs;
        }

        if let Some(dir) = self.output_path {
            cfg.output.dir = dir;
        }
        if self.report.is_some() {
            cfg.output.report = self.report;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let silent = cli.silent;
    let verbose = cli.verbose;
    let cfg = cli.into_config()?;

    let writer = match cfg.output.report.as_deref() {
        Some(format) => {
            Some(writer_for(format).ok_or_else(|| anyhow!("Unknown report format: {}", format))?)
        }
        None => None,
    };

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current table");
                token.cancel();
            }
        });
    }

    let (report, perf) = sqlitediff::run_with_timing(&cfg, &token).await?;

    if let Some(writer) = writer {
        let path = write_to_file(&*writer, &report, &cfg.output.dir)?;
        info!(path = %path.display(), "report written");
    }

    if silent {
        return Ok(());
    }

    print_report(&report);
    print_output_location(&report);
    if verbose {
        print_perf_summary(&perf);
    }
    print_elapsed(started.elapsed());

    Ok(())
}
