//! Administrative metadata table DDL and settings persistence. The table lives in the schema
//! named by `SETTINGS_SCHEMA` (default `pgdeck`).

use crate::error::AppError;
use crate::schema::quoted;
use serde_json::Value;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// `kind` value for per-table settings rows.
pub const TABLE_SETTINGS_KIND: &str = "table_settings";

/// Schema-qualified settings table, e.g. `"pgdeck"."settings"`.
pub fn settings_table(schema: &str) -> String {
    format!("{}.{}", quoted(schema), quoted("settings"))
}

/// Create the settings schema and table if missing. Safe to call on every start.
pub async fn ensure_settings_tables(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(pool)
        .await?;
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            kind TEXT NOT NULL,
            key TEXT NOT NULL,
            config JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT settings_kind_key_unique UNIQUE (kind, key)
        )
        "#,
        settings_table(schema)
    );
    sqlx::query(&ddl).execute(pool).await?;
    tracing::info!(schema = %schema, "settings table ready");
    Ok(())
}

/// Every persisted `(key, config)` of one kind.
pub async fn load_settings_rows(pool: &PgPool, schema: &str, kind: &str) -> Result<Vec<(String, Value)>, AppError> {
    let sql = format!("SELECT key, config FROM {} WHERE kind = $1", settings_table(schema));
    tracing::debug!(sql = %sql, kind, "query");
    let rows: Vec<(String, Value)> = sqlx::query_as(&sql).bind(kind).fetch_all(pool).await?;
    Ok(rows)
}

/// Upsert with a shallow JSON merge: keys in `partial` override, others are retained.
/// Returns the stored document after the merge.
pub async fn merge_settings(
    pool: &PgPool,
    schema: &str,
    kind: &str,
    key: &str,
    partial: &Value,
) -> Result<Value, AppError> {
    let table = settings_table(schema);
    let sql = format!(
        "INSERT INTO {table} (kind, key, config) VALUES ($1, $2, $3) \
         ON CONFLICT (kind, key) DO UPDATE SET config = {table}.config || EXCLUDED.config, updated_at = NOW() \
         RETURNING config"
    );
    tracing::debug!(sql = %sql, kind, key, "query");
    let merged: Value = sqlx::query_scalar(&sql)
        .bind(kind)
        .bind(key)
        .bind(partial)
        .fetch_one(pool)
        .await?;
    Ok(merged)
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

/// Split a connection URL into (URL of the `postgres` maintenance db, target db name).
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url
        .get(scheme_end..)
        .and_then(|rest| rest.find('/'))
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let mut parts = path_and_query.splitn(2, '?');
    let db_name = parts.next().unwrap_or("").trim().to_string();
    let query = parts.next().map(|q| format!("?{}", q)).unwrap_or_default();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres{}", base, query), db_name))
}
