use anyhow::Result;
use sailfish::TemplateOnce;

use crate::domain::{ports::OutputWriter, run_report::RunReport};

#[derive(TemplateOnce)]
#[template(path = "html/report.stpl")] // base dir declared inside sailfish.toml
struct ReportTemplate<'a> {
    report: &'a RunReport,
}

pub struct HtmlWriter;

impl OutputWriter for HtmlWriter {
    fn format(&self, report: &RunReport) -> Result<String> {
        Ok(ReportTemplate { report }.render_once()?)
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comparison::{ComparisonReport, ReportRow, TableStatus};

    #[test]
    fn html_escapes_table_names() {
        let rows = vec![ReportRow {
            name_old: "<script>".into(),
            name_new: "<script>".into(),
            status: TableStatus::Invalid,
            changes: None,
        }];
        let report = RunReport::new("old.db", "new.db", ComparisonReport { rows }, None);
        let html = HtmlWriter.format(&report).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Invalid"));
    }
}
