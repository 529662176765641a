use anyhow::Result;

use crate::domain::{ports::OutputWriter, run_report::RunReport};

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
