use std::path::PathBuf;

use thiserror::Error;

use crate::domain::value_objects::Side;

/// Typed failures the diff engine can raise.
///
/// Infrastructure errors (sqlx, I/O) travel as `anyhow::Error` with context;
/// these variants are the ones callers are expected to match on, via
/// `anyhow::Error::downcast_ref::<DiffError>()`.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("{} does not exist", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("invalid table:column entry `{entry}`: {reason}")]
    KeyParse { entry: String, reason: String },

    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    /// A key produced by a set query found no row in the transient set it was
    /// projected from. Indicates an engine inconsistency, never a data issue.
    #[error("no {side} row of `{table}` matches key {key}")]
    KeyLookupMiss {
        table: String,
        side: Side,
        key: String,
    },

    #[error("memory budget must be a positive number of megabytes")]
    InvalidMemory,

    #[error("diff cancelled")]
    Cancelled,
}

impl DiffError {
    pub fn key_parse(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyParse {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}
