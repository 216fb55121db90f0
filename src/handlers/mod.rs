//! HTTP handlers for table data, schema introspection and raw SQL.

pub mod data;
pub mod schema;
pub mod sql;
