//! Generic CRUD execution against PostgreSQL. Every statement goes through the JSON wrapper
//! and comes back as a single `json` value.

use crate::error::AppError;
use crate::query::{Filters, GetRowsParams, RawRow, SelectColumns};
use crate::schema::{Column, Table};
use crate::settings::TableSettings;
use crate::sql::{cast_placeholders, delete_rows, insert_row, select_rows, update_rows, QueryBuf};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Either, Executor, PgPool, Postgres};

/// Rows plus the descriptors of the columns that were selected.
#[derive(Clone, Debug, Serialize)]
pub struct TableView {
    pub rows: Vec<Value>,
    pub columns: Vec<Column>,
}

pub struct CrudService;

impl CrudService {
    pub async fn get_rows(pool: &PgPool, table: &Table, params: &GetRowsParams) -> Result<Vec<Value>, AppError> {
        let q = select_rows(table, params);
        fetch_json_rows(pool, q).await
    }

    pub async fn insert_row(pool: &PgPool, table: &Table, row: &RawRow) -> Result<Vec<Value>, AppError> {
        let q = insert_row(table, row)?;
        fetch_json_rows(pool, q).await
    }

    pub async fn update_rows(
        pool: &PgPool,
        table: &Table,
        filters: &Filters,
        row: &RawRow,
    ) -> Result<Vec<Value>, AppError> {
        let q = update_rows(table, filters, row)?;
        fetch_json_rows(pool, q).await
    }

    pub async fn delete_rows(pool: &PgPool, table: &Table, filters: &Filters) -> Result<Vec<Value>, AppError> {
        let q = delete_rows(table, filters)?;
        fetch_json_rows(pool, q).await
    }

    /// Like `get_rows`, with the table's saved view defaults filling in what the caller left unset.
    pub async fn get_table_view(
        pool: &PgPool,
        table: &Table,
        params: GetRowsParams,
        settings: &TableSettings,
    ) -> Result<TableView, AppError> {
        let params = apply_view_defaults(params, settings);
        let columns = params.select_columns.resolve(table).into_iter().cloned().collect();
        let rows = Self::get_rows(pool, table, &params).await?;
        Ok(TableView { rows, columns })
    }
}

pub(crate) fn apply_view_defaults(mut params: GetRowsParams, settings: &TableSettings) -> GetRowsParams {
    if params.select_columns.is_empty() {
        params.select_columns = SelectColumns(settings.table_view_select_columns.clone());
    }
    params.filters = params
        .filters
        .with_default_text_columns(&settings.table_view_text_filters_cols);
    params
}

/// Run `q` wrapped as a JSON aggregate and return the rows.
pub(crate) async fn fetch_json_rows(pool: &PgPool, q: QueryBuf) -> Result<Vec<Value>, AppError> {
    let q = q.into_json();
    let sql = cast_inferred_params(pool, &q.sql, q.inferred_params).await?;
    tracing::debug!(sql = %sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<Postgres, Value>(&sql);
    for p in q.params {
        query = query.bind(p);
    }
    match query.fetch_one(pool).await? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

const FORMAT_TYPES_SQL: &str = "SELECT CASE WHEN t IN (0, 705) THEN NULL ELSE format_type(t::oid, -1) END \
     FROM unnest($1::int8[]) WITH ORDINALITY AS p(t, n) ORDER BY n";

/// Values travel as text, so the first `count` parameters of `sql` (written by the caller,
/// without casts) are cast to the types PostgreSQL infers for them when describing `sql`.
/// `format_type(oid, -1)` names the type without a length modifier (`bpchar`, not `character(1)`).
/// Parameters left `unknown` (oid 705) keep their plain text binding.
pub(crate) async fn cast_inferred_params(pool: &PgPool, sql: &str, count: usize) -> Result<String, AppError> {
    if count == 0 {
        return Ok(sql.to_string());
    }
    let described = pool.describe(sql).await?;
    let oids: Vec<i64> = match described.parameters() {
        Some(Either::Left(types)) => types
            .iter()
            .take(count)
            .map(|t| t.oid().map_or(0, |oid| i64::from(oid.0)))
            .collect(),
        _ => return Ok(sql.to_string()),
    };
    tracing::debug!(sql = %FORMAT_TYPES_SQL, oids = ?oids, "query");
    let types: Vec<Option<String>> = sqlx::query_scalar::<Postgres, Option<String>>(FORMAT_TYPES_SQL)
        .bind(oids)
        .fetch_all(pool)
        .await?;
    Ok(cast_placeholders(sql, &types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filters, TextSearchFilter};
    use crate::schema::fixtures::*;

    fn saved() -> TableSettings {
        TableSettings {
            table_view_select_columns: vec!["name".into()],
            table_view_text_filters_cols: vec!["name".into()],
            ..Default::default()
        }
    }

    #[test]
    fn view_defaults_fill_unset_params() {
        let params = GetRowsParams {
            filters: Filters::TextSearch(TextSearchFilter { text: "a".into(), columns: vec![] }),
            ..Default::default()
        };
        let p = apply_view_defaults(params, &saved());
        assert_eq!(p.select_columns.0, vec!["name"]);
        assert!(matches!(&p.filters, Filters::TextSearch(t) if t.columns == vec!["name"]));
        assert_eq!(p.select_columns.render(&users()), "\"name\"");
    }

    #[test]
    fn explicit_params_win_over_defaults() {
        let params = GetRowsParams {
            select_columns: SelectColumns(vec!["age".into()]),
            ..Default::default()
        };
        let p = apply_view_defaults(params, &saved());
        assert_eq!(p.select_columns.0, vec!["age"]);
        assert!(matches!(p.filters, Filters::None));
    }
}
