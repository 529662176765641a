use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::error::DiffError;
use crate::domain::fingerprint::FingerprintMode;
use crate::domain::table_columns::TableColumns;
use crate::infrastructure::db::catalog::LoadOptions;

/// Prefix of environment overrides, e.g. `SQLITEDIFF__DIFF__MEMORY_MB=512`.
const ENV_PREFIX: &str = "SQLITEDIFF";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Database compared as "old" (`-`, `u-`, `dup_old` rows come from it).
    #[serde(default)]
    pub old_db: PathBuf,
    #[serde(default)]
    pub new_db: PathBuf,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiffConfig {
    /// Page cache per connection, in megabytes.
    pub memory_mb: u64,
    /// Columns ignored in every table.
    pub ignore: Vec<String>,
    /// Tables never diffed row by row.
    pub ignore_tables: Vec<String>,
    pub ignore_table_columns: TableColumns,
    /// Per-table key override.
    pub unique: TableColumns,
    pub fingerprint: FingerprintMode,
    /// Upper bound on concurrent workers; defaults to available parallelism.
    pub jobs: Option<usize>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            memory_mb: 1024,
            ignore: Vec::new(),
            ignore_tables: Vec::new(),
            ignore_table_columns: TableColumns::default(),
            unique: TableColumns::default(),
            fingerprint: FingerprintMode::default(),
            jobs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the output store and report files.
    pub dir: PathBuf,
    /// Extra report file: "json" or "html".
    pub report: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            report: None,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the TOML file at `path` (when given) and then
    /// with `SQLITEDIFF__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let name = path.to_str().with_context(|| {
                format!("Config path is not valid UTF-8: {}", path.display())
            })?;
            builder = builder.add_source(config::File::new(name, config::FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let cfg: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.diff.memory_mb == 0 {
            return Err(DiffError::InvalidMemory.into());
        }
        Ok(())
    }

    pub fn ignored_tables(&self) -> HashSet<String> {
        self.diff.ignore_tables.iter().cloned().collect()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            ignore: self.diff.ignore.clone(),
            ignore_table_columns: self.diff.ignore_table_columns.clone(),
            unique: self.diff.unique.clone(),
            fingerprint_mode: self.diff.fingerprint,
        }
    }

    /// Worker bound used for every connection pool of a run.
    pub fn jobs(&self) -> usize {
        self.diff
            .jobs
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, |n| n.get()))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.diff.memory_mb, 1024);
        assert_eq!(cfg.output.dir, PathBuf::from("."));
        assert_eq!(cfg.diff.fingerprint, FingerprintMode::Ordered);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_file_fills_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[diff]
memory_mb = 256
ignore = ["updated_at"]
ignore_tables = ["audit"]
fingerprint = "multiset"

[diff.unique]
orders = ["order_no", "line"]

[diff.ignore_table_columns]
users = ["last_login"]

[output]
dir = "out"
report = "json"
"#
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.diff.memory_mb, 256);
        assert_eq!(cfg.diff.ignore, ["updated_at"]);
        assert!(cfg.ignored_tables().contains("audit"));
        assert_eq!(cfg.diff.fingerprint, FingerprintMode::Multiset);
        assert_eq!(
            cfg.diff.unique.get("orders"),
            Some(&["order_no".to_string(), "line".to_string()][..])
        );
        assert_eq!(
            cfg.diff.ignore_table_columns.get("users"),
            Some(&["last_login".to_string()][..])
        );
        assert_eq!(cfg.output.dir, PathBuf::from("out"));
        assert_eq!(cfg.output.report.as_deref(), Some("json"));
    }

    #[test]
    fn zero_memory_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.diff.memory_mb = 0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::InvalidMemory)
        ));
    }

    #[test]
    fn jobs_never_zero() {
        let mut cfg = AppConfig::default();
        cfg.diff.jobs = Some(0);
        assert_eq!(cfg.jobs(), 1);
    }
}
