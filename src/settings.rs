//! Per-table UI/behaviour settings, persisted as one JSON document per table and cached in process.

use crate::error::AppError;
use crate::schema::Table;
use crate::service::RelationsConfig;
use crate::store::{load_settings_rows, merge_settings, TABLE_SETTINGS_KIND};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tokio::sync::Mutex;

/// Overrides the input widget the admin UI picks for a column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTypeLookup {
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub view_link_pattern: String,
    #[serde(default)]
    pub table_view_select_columns: Vec<String>,
    #[serde(default)]
    pub table_view_text_filters_cols: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overridden_inputs: BTreeMap<String, InputTypeLookup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationsConfig>,
}

impl TableSettings {
    /// Fill the view column lists from the table when unset: all columns, all text columns.
    /// Only applied to what is handed out, never persisted.
    pub fn with_defaults(mut self, table: &Table) -> Self {
        if self.table_view_select_columns.is_empty() {
            self.table_view_select_columns = table.column_names();
        }
        if self.table_view_text_filters_cols.is_empty() {
            self.table_view_text_filters_cols = table.text_column_names();
        }
        self
    }

    /// Shallow merge of `partial` over this document, validated as settings.
    pub fn merged_with(&self, partial: &Map<String, Value>) -> Result<TableSettings, AppError> {
        let mut doc = match serde_json::to_value(self) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        };
        for (k, v) in partial {
            doc.insert(k.clone(), v.clone());
        }
        serde_json::from_value(Value::Object(doc)).map_err(|e| AppError::Validation(e.to_string()))
    }
}

/// Cache of persisted settings keyed by table name.
///
/// Reads never hit the database. Writes go through `update`, which holds a store-wide
/// lock across the upsert and the cache refresh so the cache always holds the value
/// the database returned last.
pub struct TableSettingsStore {
    settings_schema: String,
    cache: RwLock<HashMap<String, TableSettings>>,
    write_lock: Mutex<()>,
}

impl TableSettingsStore {
    pub fn new(settings_schema: impl Into<String>) -> Self {
        TableSettingsStore {
            settings_schema: settings_schema.into(),
            cache: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Load every persisted table settings document. Invalid documents are skipped with a warning.
    pub async fn load(pool: &PgPool, settings_schema: &str) -> Result<Self, AppError> {
        let store = Self::new(settings_schema);
        let rows = load_settings_rows(pool, settings_schema, TABLE_SETTINGS_KIND).await?;
        let count = rows.len();
        for (key, config) in rows {
            match serde_json::from_value::<TableSettings>(config) {
                Ok(s) => store.put(&key, s),
                Err(e) => tracing::warn!(table = %key, error = %e, "skipping invalid table settings"),
            }
        }
        tracing::info!(count, "table settings loaded");
        Ok(store)
    }

    pub fn settings_schema(&self) -> &str {
        &self.settings_schema
    }

    fn cached(&self, table: &str) -> Option<TableSettings> {
        let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
        guard.get(table).cloned()
    }

    fn put(&self, table: &str, settings: TableSettings) {
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(table.to_string(), settings);
    }

    /// Settings for `table` with view defaults applied. Tables never configured get pure defaults.
    pub fn get(&self, table: &Table) -> TableSettings {
        self.cached(&table.name).unwrap_or_default().with_defaults(table)
    }

    /// Merge `partial` into the stored document. The merged result must still be valid settings.
    pub async fn update(
        &self,
        pool: &PgPool,
        table: &Table,
        partial: &Value,
    ) -> Result<TableSettings, AppError> {
        let Value::Object(fields) = partial else {
            return Err(AppError::BadRequest("settings must be a JSON object".into()));
        };
        let _guard = self.write_lock.lock().await;
        self.cached(&table.name).unwrap_or_default().merged_with(fields)?;

        let stored = merge_settings(pool, &self.settings_schema, TABLE_SETTINGS_KIND, &table.name, partial).await?;
        let settings: TableSettings =
            serde_json::from_value(stored).map_err(|e| AppError::Validation(e.to_string()))?;
        self.put(&table.name, settings.clone());
        tracing::info!(table = %table.name, "table settings updated");
        Ok(settings.with_defaults(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;
    use serde_json::json;

    #[test]
    fn defaults_cover_all_columns_and_text_columns() {
        let store = TableSettingsStore::new("pgdeck");
        let s = store.get(&users());
        assert_eq!(s.table_view_select_columns, vec!["id", "name", "age"]);
        assert_eq!(s.table_view_text_filters_cols, vec!["name"]);
        assert!(s.view_link_pattern.is_empty());
    }

    #[test]
    fn defaults_are_not_cached() {
        let store = TableSettingsStore::new("pgdeck");
        store.get(&users());
        assert!(store.cached("users").is_none());
    }

    #[test]
    fn cached_settings_keep_explicit_lists() {
        let store = TableSettingsStore::new("pgdeck");
        store.put(
            "users",
            TableSettings {
                table_view_select_columns: vec!["name".into()],
                view_link_pattern: "/u/{id}".into(),
                ..Default::default()
            },
        );
        let s = store.get(&users());
        assert_eq!(s.table_view_select_columns, vec!["name"]);
        assert_eq!(s.table_view_text_filters_cols, vec!["name"]);
        assert_eq!(s.view_link_pattern, "/u/{id}");
    }

    #[test]
    fn merge_overrides_and_retains() {
        let current = TableSettings {
            view_link_pattern: "/a".into(),
            table_view_select_columns: vec!["id".into()],
            ..Default::default()
        };
        let partial = json!({"viewLinkPattern": "/b"});
        let merged = current.merged_with(partial.as_object().unwrap()).unwrap();
        assert_eq!(merged.view_link_pattern, "/b");
        assert_eq!(merged.table_view_select_columns, vec!["id"]);
    }

    #[test]
    fn merge_rejects_ill_typed_fields() {
        let partial = json!({"tableViewSelectColumns": "id"});
        let err = TableSettings::default().merged_with(partial.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn document_shape() {
        let s: TableSettings = serde_json::from_value(json!({
            "overriddenInputs": {"bio": {"type": "markdown", "isArray": false, "payload": null}},
            "relations": [{"mainTable": "users", "relationTable": "tags", "joinTable": "user_tags"}]
        }))
        .unwrap();
        assert_eq!(s.overridden_inputs["bio"].input_type, "markdown");
        assert_eq!(s.relations[0].join_table, "user_tags");
        assert!(!s.relations[0].bidirectional);
    }

    #[tokio::test]
    async fn update_requires_object() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let store = TableSettingsStore::new("pgdeck");
        let err = store.update(&pool, &users(), &json!([1])).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = store
            .update(&pool, &users(), &json!({"relations": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
