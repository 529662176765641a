pub mod catalog;
pub mod client;
pub mod output_store;
pub mod row_differ;
pub mod row_mapper;
pub mod schema_text;
pub mod sql_utils;
