use crate::application::monitoring::PerfReport;
use crate::domain::comparison::{ReportRow, TableStatus};
use crate::domain::run_report::RunReport;
use crate::domain::table_diff::StatusCounts;
use colored::*;
use std::time::Duration;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ReportLine {
    old_tbl: String,
    new_tbl: String,
    status: String,
    changes: String,
}

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

fn colored_status(status: TableStatus) -> String {
    let label = status.label();
    match status {
        TableStatus::Ok => label.green().to_string(),
        TableStatus::Ng => label.red().bold().to_string(),
        TableStatus::Invalid => label.yellow().bold().to_string(),
        TableStatus::Ignore | TableStatus::Missing { .. } => label.dimmed().to_string(),
    }
}

fn changes_cell(changes: Option<StatusCounts>) -> String {
    let Some(c) = changes else {
        return String::new();
    };
    let mut parts = vec![
        format!("+{}", c.inserted).green().to_string(),
        format!("-{}", c.deleted).red().to_string(),
        format!("~{}", c.updated).yellow().to_string(),
    ];
    let dups = c.duplicate_old + c.duplicate_new;
    if dups > 0 {
        parts.push(format!("dup {}", dups).magenta().to_string());
    }
    parts.join(" ")
}

fn line(row: &ReportRow) -> ReportLine {
    ReportLine {
        old_tbl: row.name_old.bold().to_string(),
        new_tbl: row.name_new.bold().to_string(),
        status: colored_status(row.status),
        changes: changes_cell(row.changes),
    }
}

/// Print the table-by-table comparison report to stdout.
pub fn print_report(report: &RunReport) {
    println!();
    println!("{}", "SQLITEDIFF REPORT".bold().cyan());
    println!("{} → {}", report.old_db.blue(), report.new_db.green());
    println!();

    if report.tables.is_empty() {
        println!("{}", "No tables found.".italic());
        return;
    }

    let rows: Vec<ReportLine> = report.tables.iter().map(line).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    let s = &report.summary;
    let summary_rows = vec![
        SummaryRow {
            metric: "OK".into(),
            value: s.tables_ok.to_string().green().to_string(),
        },
        SummaryRow {
            metric: "NG".into(),
            value: s.tables_changed.to_string().red().to_string(),
        },
        SummaryRow {
            metric: "Invalid".into(),
            value: s.tables_invalid.to_string().yellow().to_string(),
        },
        SummaryRow {
            metric: "Ignored".into(),
            value: s.tables_ignored.to_string().dimmed().to_string(),
        },
        SummaryRow {
            metric: "Missing".into(),
            value: s.tables_missing.to_string().dimmed().to_string(),
        },
        SummaryRow {
            metric: "Records written".into(),
            value: s.total_records.to_string().bold().to_string(),
        },
    ];

    let summary_table = Table::new(summary_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();

    println!();
    println!("{summary_table}");
    println!();
}

/// `Output: <path>` line, printed only when an output store was written.
pub fn print_output_location(report: &RunReport) {
    if let Some(path) = &report.output_path {
        println!("Output: {}", path.bold());
    }
}

pub fn print_elapsed(elapsed: Duration) {
    println!(
        "Processing time: {}",
        format!("{:.3}s", elapsed.as_secs_f64()).bold()
    );
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    target: String,
    #[tabled(rename = "rows")]
    rows: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stdout.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    println!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: t.operation.dimmed().to_string(),
            target: t.target.bold().to_string(),
            rows: t.rows.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();

    println!("{table}");

    println!(
        "  Total: {} row(s) scanned  ·  {} ms in timed operations",
        report.total_rows_scanned.to_string().bold(),
        format_duration(report.total_ms),
    );
    println!();
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}
