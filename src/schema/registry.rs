//! Published schema: one `Arc<TablesMap>` swapped wholesale on reload.

use crate::error::AppError;
use crate::schema::{load_tables, Table, TablesMap};
use sqlx::PgPool;
use std::sync::{Arc, RwLock};

/// Readers clone the current `Arc` and keep using it; a reload only swaps the pointer,
/// so a reader sees either the old map or the new one in full.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    schema_name: String,
    included_tables: Vec<String>,
    tables: Arc<RwLock<Arc<TablesMap>>>,
}

impl SchemaRegistry {
    pub fn new(schema_name: impl Into<String>, included_tables: Vec<String>, tables: TablesMap) -> Self {
        SchemaRegistry {
            schema_name: schema_name.into(),
            included_tables,
            tables: Arc::new(RwLock::new(Arc::new(tables))),
        }
    }

    /// Introspect once and publish the result.
    pub async fn load(pool: &PgPool, schema_name: &str, included_tables: &[String]) -> Result<Self, AppError> {
        let tables = load_tables(pool, schema_name, included_tables).await?;
        Ok(Self::new(schema_name, included_tables.to_vec(), tables))
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn snapshot(&self) -> Arc<TablesMap> {
        let guard = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn table(&self, name: &str) -> Result<Table, AppError> {
        self.snapshot()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownTable(name.to_string()))
    }

    /// Replace the published map. Used by `reload` and by tests.
    pub fn publish(&self, tables: TablesMap) {
        let mut guard = self.tables.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(tables);
    }

    /// Re-run introspection; on error the previous map stays published.
    pub async fn reload(&self, pool: &PgPool) -> Result<Arc<TablesMap>, AppError> {
        let tables = load_tables(pool, &self.schema_name, &self.included_tables).await?;
        self.publish(tables);
        tracing::info!(schema = %self.schema_name, "schema reloaded");
        Ok(self.snapshot())
    }
}
