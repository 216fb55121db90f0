//! Shared application state for all routes. The schema is reloadable without restart.

use crate::config::AppConfig;
use crate::schema::SchemaRegistry;
use crate::settings::TableSettingsStore;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub schema: SchemaRegistry,
    pub settings: Arc<TableSettingsStore>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, schema: SchemaRegistry, settings: TableSettingsStore) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
            schema,
            settings: Arc::new(settings),
        }
    }
}
