pub mod comparison;
pub mod error;
pub mod fingerprint;
pub mod ports;
pub mod run_report;
pub mod table_columns;
pub mod table_def;
pub mod table_diff;
pub mod value_objects;
