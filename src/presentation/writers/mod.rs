use crate::domain::{ports::OutputWriter, run_report::RunReport};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use self::{html::HtmlWriter, json::JsonWriter};

pub mod html;
pub mod json;

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "html" => Some(Box::new(HtmlWriter)),
        _ => None,
    }
}

/// Writes the report to `<dir>/<run_id>.<ext>` via the chosen writer.
pub fn write_to_file(writer: &dyn OutputWriter, report: &RunReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let content = writer.format(report)?;
    let path = dir.join(format!("{}.{}", report.run_id, writer.extension()));
    fs::write(&path, &content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comparison::ComparisonReport;

    #[test]
    fn known_formats_only() {
        assert_eq!(writer_for("json").map(|w| w.extension()), Some("json"));
        assert_eq!(writer_for("html").map(|w| w.extension()), Some("html"));
        assert!(writer_for("sql").is_none());
    }

    #[test]
    fn file_named_after_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new("a.db", "b.db", ComparisonReport::default(), None);
        let path = write_to_file(&JsonWriter, &report, dir.path()).unwrap();
        assert_eq!(path, dir.path().join(format!("{}.json", report.run_id)));
        assert!(path.exists());
    }
}
