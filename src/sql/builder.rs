//! Builds parameterized SELECT, INSERT, UPDATE, DELETE against a schema `Table`.
//! Identifiers only ever come from the table model; values are always parameters.

use crate::error::AppError;
use crate::query::{Filters, GetRowsParams, RawRow, Sorting};
use crate::schema::Table;
use crate::sql::PgBindValue;

#[derive(Clone, Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
    /// `$1..$n` come from a caller-written expression and still need their inferred type cast.
    pub inferred_params: usize,
}

impl QueryBuf {
    /// Let the database serialize the result set; no rows yields `[]`, never null.
    pub fn into_json(self) -> Self {
        QueryBuf {
            sql: wrap_json(&self.sql),
            ..self
        }
    }
}

pub fn wrap_json(sql: &str) -> String {
    format!(
        "WITH q AS ({}) SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json) FROM q",
        sql
    )
}

fn join_clauses(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SELECT with filters, sort (primary key ascending when none survives) and pagination.
pub fn select_rows(table: &Table, params: &GetRowsParams) -> QueryBuf {
    let head = format!("SELECT {} FROM {}", params.select_columns.render(table), table.safe_name());
    let filter = params.filters.render(table);
    let mut order = params.sorting.render(table);
    if order.is_empty() {
        order = Sorting::default_for(table).render(table);
    }
    let page = params.pagination.render();
    QueryBuf {
        sql: join_clauses(&[&head, &filter.sql, &order, &page]),
        params: filter.args,
        inferred_params: filter.inferred_params,
    }
}

pub fn insert_row(table: &Table, row: &RawRow) -> Result<QueryBuf, AppError> {
    let bound = row.bind_columns(table, 0);
    if bound.is_empty() {
        return Err(AppError::NoValidColumns(table.name.clone()));
    }
    let cols: Vec<String> = bound.iter().map(|b| b.column.safe_name()).collect();
    let placeholders: Vec<String> = bound.iter().map(|b| b.placeholder()).collect();
    Ok(QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table.safe_name(),
            cols.join(", "),
            placeholders.join(", ")
        ),
        params: bound.into_iter().map(|b| b.value).collect(),
        inferred_params: 0,
    })
}

/// WHERE args bind first; SET placeholders are numbered after them.
pub fn update_rows(table: &Table, filters: &Filters, row: &RawRow) -> Result<QueryBuf, AppError> {
    let filter = filters.render(table);
    let bound = row.bind_columns(table, filter.args.len());
    if bound.is_empty() {
        return Err(AppError::NoValidColumns(table.name.clone()));
    }
    let sets: Vec<String> = bound
        .iter()
        .map(|b| format!("{} = {}", b.column.safe_name(), b.placeholder()))
        .collect();
    let head = format!("UPDATE {} SET {}", table.safe_name(), sets.join(", "));
    let mut params = filter.args;
    params.extend(bound.into_iter().map(|b| b.value));
    Ok(QueryBuf {
        sql: join_clauses(&[&head, &filter.sql, "RETURNING *"]),
        params,
        inferred_params: filter.inferred_params,
    })
}

/// Refuses to build an unfiltered DELETE.
pub fn delete_rows(table: &Table, filters: &Filters) -> Result<QueryBuf, AppError> {
    let filter = filters.render(table);
    if filter.is_empty() {
        return Err(AppError::EmptyFilter(table.name.clone()));
    }
    Ok(QueryBuf {
        sql: format!("DELETE FROM {} {} RETURNING *", table.safe_name(), filter.sql),
        params: filter.args,
        inferred_params: filter.inferred_params,
    })
}
