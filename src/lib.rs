//! pgdeck: schema-introspected generic CRUD REST backend for PostgreSQL.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, SchemaError};
pub use routes::{common_routes, data_routes, router, schema_routes, sql_routes};
pub use schema::{SchemaRegistry, Table, TablesMap};
pub use service::{CrudService, RelationsService, SqlExecutionService};
pub use settings::{TableSettings, TableSettingsStore};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_settings_tables};
