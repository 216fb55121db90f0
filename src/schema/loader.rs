//! Catalog introspection: builds a complete `TablesMap` or fails as a whole.

use crate::error::SchemaError;
use crate::schema::{Column, ForeignKeyInfo, Table, TablesMap};
use sqlx::{PgPool, Row};

/// Type OIDs classified as text-like for default text search.
pub const TEXT_OID: i32 = 25;
pub const VARCHAR_OID: i32 = 1043;

pub fn is_text_oid(oid: i32) -> bool {
    oid == TEXT_OID || oid == VARCHAR_OID
}

const BASE_TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        c.table_name::text AS table_name,
        c.column_name::text AS column_name,
        c.udt_name::text::regtype::oid::int AS oid,
        c.udt_name::text::regtype::text AS reg_type,
        c.udt_name::text AS udt_name,
        c.is_nullable = 'YES' AS is_nullable,
        c.column_default::text AS column_default,
        (
            SELECT COUNT(*) > 0
            FROM information_schema.key_column_usage kcu
            JOIN information_schema.table_constraints tc
                ON tc.constraint_name = kcu.constraint_name
                AND tc.constraint_schema = kcu.constraint_schema
            WHERE tc.table_schema = c.table_schema
                AND tc.table_name = c.table_name
                AND tc.constraint_type = 'PRIMARY KEY'
                AND kcu.column_name = c.column_name
        ) AS is_primary_key,
        (
            SELECT json_build_object(
                'tableName', cl.table_name,
                'columnName', cl.column_name,
                'constraintName', fk.constraint_name
            )
            FROM information_schema.constraint_column_usage AS cl
            JOIN information_schema.referential_constraints fk
                ON cl.constraint_name = fk.unique_constraint_name
                AND cl.constraint_schema = fk.unique_constraint_schema
            JOIN information_schema.key_column_usage AS kcu
                ON kcu.constraint_name = fk.constraint_name
                AND kcu.constraint_schema = fk.constraint_schema
            WHERE kcu.table_schema = c.table_schema
                AND kcu.table_name = c.table_name
                AND kcu.column_name = c.column_name
            LIMIT 1
        ) AS foreign_key_info
    FROM information_schema.columns c
    WHERE c.table_schema = $1 AND c.table_name::text = ANY($2)
    ORDER BY c.table_name, c.ordinal_position ASC
"#;

/// One row of the batched column metadata query.
#[derive(Clone, Debug)]
pub struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub oid: i32,
    pub reg_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub is_primary_key: bool,
    pub foreign_key_info: Option<serde_json::Value>,
}

/// Load tables of `schema_name`. With an empty `included_tables` all base tables are discovered;
/// otherwise the named tables are used. Named tables that do not exist are left out.
pub async fn load_tables(
    pool: &PgPool,
    schema_name: &str,
    included_tables: &[String],
) -> Result<TablesMap, SchemaError> {
    let names: Vec<String> = if included_tables.is_empty() {
        tracing::debug!(sql = %BASE_TABLES_SQL, schema = %schema_name, "query");
        sqlx::query_scalar::<_, String>(BASE_TABLES_SQL)
            .bind(schema_name)
            .fetch_all(pool)
            .await?
    } else {
        included_tables.to_vec()
    };

    tracing::debug!(sql = %COLUMNS_SQL, schema = %schema_name, tables = ?names, "query");
    let rows = sqlx::query(COLUMNS_SQL)
        .bind(schema_name)
        .bind(&names)
        .fetch_all(pool)
        .await?;

    let mut column_rows = Vec::with_capacity(rows.len());
    for row in rows {
        column_rows.push(ColumnRow {
            table_name: row.try_get("table_name")?,
            column_name: row.try_get("column_name")?,
            oid: row.try_get("oid")?,
            reg_type: row.try_get("reg_type")?,
            udt_name: row.try_get("udt_name")?,
            is_nullable: row.try_get("is_nullable")?,
            column_default: row.try_get("column_default")?,
            is_primary_key: row.try_get("is_primary_key")?,
            foreign_key_info: row.try_get("foreign_key_info")?,
        });
    }

    let tables = assemble_tables(schema_name, &names, column_rows)?;
    for name in names.iter().filter(|n| !tables.contains_key(*n)) {
        tracing::warn!(table = %name, schema = %schema_name, "included table not found; skipped");
    }
    tracing::info!(schema = %schema_name, tables = tables.len(), "schema loaded");
    Ok(tables)
}

/// Group column rows under their tables, preserving row order within each table.
/// Tables that received no columns do not exist and are dropped.
pub fn assemble_tables(
    schema_name: &str,
    table_names: &[String],
    rows: Vec<ColumnRow>,
) -> Result<TablesMap, SchemaError> {
    let mut tables: TablesMap = table_names
        .iter()
        .map(|n| (n.clone(), Table::new(schema_name, n.clone())))
        .collect();

    for r in rows {
        let foreign_key = match r.foreign_key_info {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(serde_json::from_value::<ForeignKeyInfo>(v).map_err(|e| SchemaError::ForeignKey {
                table: r.table_name.clone(),
                column: r.column_name.clone(),
                message: e.to_string(),
            })?),
        };
        let table = tables.get_mut(&r.table_name).ok_or_else(|| SchemaError::OrphanColumn {
            table: r.table_name.clone(),
            column: r.column_name.clone(),
        })?;
        table.columns.push(Column {
            is_text: is_text_oid(r.oid),
            name: r.column_name,
            oid: r.oid,
            reg_type: r.reg_type,
            udt_name: r.udt_name,
            is_nullable: r.is_nullable,
            default: r.column_default,
            is_primary_key: r.is_primary_key,
            foreign_key,
        });
    }
    tables.retain(|_, t| !t.columns.is_empty());
    Ok(tables)
}

/// Non-system schema names.
pub async fn load_schema_names(pool: &PgPool) -> Result<Vec<String>, SchemaError> {
    let sql = r#"
        SELECT nspname::text
        FROM pg_catalog.pg_namespace
        WHERE nspname NOT IN ('pg_catalog', 'pg_toast', 'information_schema')
        ORDER BY nspname
    "#;
    tracing::debug!(sql = %sql, "query");
    let names = sqlx::query_scalar::<_, String>(sql).fetch_all(pool).await?;
    Ok(names)
}
