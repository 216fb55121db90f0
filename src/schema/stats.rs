//! Size and row statistics for the exposed schema.

use crate::error::AppError;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchemaStats {
    pub db_name: String,
    pub schema_name: String,
    pub tables_count: i64,
    pub total_rows: i64,
    /// Bytes.
    pub size: i64,
    pub size_pretty: String,
}

const STATS_SQL: &str = r#"
    WITH table_count AS (
        SELECT COUNT(*) AS cnt
        FROM information_schema.tables
        WHERE table_schema = $1 AND table_type = 'BASE TABLE'
    ),
    row_stats AS (
        SELECT COALESCE(SUM(n_live_tup), 0)::bigint AS rows
        FROM pg_stat_user_tables
        WHERE schemaname = $1
    ),
    size_stats AS (
        SELECT COALESCE(SUM(pg_total_relation_size(c.oid)), 0)::bigint AS bytes
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
    )
    SELECT current_database()::text, tc.cnt, rs.rows, ss.bytes, pg_size_pretty(ss.bytes)
    FROM table_count tc, row_stats rs, size_stats ss
"#;

/// Single round trip.
pub async fn schema_stats(pool: &PgPool, schema_name: &str) -> Result<DatabaseSchemaStats, AppError> {
    tracing::debug!(sql = %STATS_SQL, schema = %schema_name, "query");
    let (db_name, tables_count, total_rows, size, size_pretty): (String, i64, i64, i64, String) =
        sqlx::query_as(STATS_SQL).bind(schema_name).fetch_one(pool).await?;
    Ok(DatabaseSchemaStats {
        db_name,
        schema_name: schema_name.to_string(),
        tables_count,
        total_rows,
        size,
        size_pretty,
    })
}
