//! Table row handlers: list, insert, update, delete, view, and many-to-many relations.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::query::{Filters, GetRowsParams, RawRow};
use crate::response::{success_many, success_many_created, success_one_ok};
use crate::service::{
    resolve_relation, CrudService, RelationsConfig, RelationsService, UpdateRelatedRowsActions,
};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

fn body_to_row(value: Value) -> Result<RawRow, AppError> {
    match value {
        Value::Object(m) => Ok(RawRow(m)),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn get_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let params = GetRowsParams::from_query(&query, state.config.max_page_limit);
    let rows = CrudService::get_rows(&state.pool, &table, &params).await?;
    Ok(success_many(rows))
}

pub async fn insert_row(
    State(state): State<AppState>,
    identity: Identity,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let row = body_to_row(body)?;
    let rows = CrudService::insert_row(&state.pool, &table, &row).await?;
    tracing::info!(table = %table.name, user = identity.principal(), "row inserted");
    Ok(success_many_created(rows))
}

pub async fn update_rows(
    State(state): State<AppState>,
    identity: Identity,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let filters = Filters::from_query(&query);
    let row = body_to_row(body)?;
    let rows = CrudService::update_rows(&state.pool, &table, &filters, &row).await?;
    tracing::info!(table = %table.name, user = identity.principal(), count = rows.len(), "rows updated");
    Ok(success_many(rows))
}

pub async fn delete_rows(
    State(state): State<AppState>,
    identity: Identity,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let filters = Filters::from_query(&query);
    let rows = CrudService::delete_rows(&state.pool, &table, &filters).await?;
    tracing::info!(table = %table.name, user = identity.principal(), count = rows.len(), "rows deleted");
    Ok(success_many(rows))
}

pub async fn get_table_view(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let params = GetRowsParams::from_query(&query, state.config.max_page_limit);
    let settings = state.settings.get(&table);
    let view = CrudService::get_table_view(&state.pool, &table, params, &settings).await?;
    Ok(success_one_ok(view))
}

/// Relation descriptor for the relation routes; the main table comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationQuery {
    pub relation_table: String,
    pub join_table: String,
    #[serde(default)]
    pub bidirectional: bool,
    pub main_join_column: Option<String>,
    pub relation_join_column: Option<String>,
}

impl RelationQuery {
    fn into_config(self, main_table: String) -> RelationsConfig {
        RelationsConfig {
            main_table,
            relation_table: self.relation_table,
            join_table: self.join_table,
            bidirectional: self.bidirectional,
            main_join_column: self.main_join_column,
            relation_join_column: self.relation_join_column,
        }
    }
}

pub async fn get_related_rows(
    State(state): State<AppState>,
    Path((main_table, main_row_id)): Path<(String, String)>,
    Query(query): Query<RelationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let relation = resolve_relation(&state.schema.snapshot(), &query.into_config(main_table))?;
    let rows = RelationsService::get_related_rows(&state.pool, &relation, &main_row_id).await?;
    Ok(success_many(rows))
}

/// Apply `{addIds, deleteIds}` and return the related rows after the change.
pub async fn update_related_rows(
    State(state): State<AppState>,
    identity: Identity,
    Path((main_table, main_row_id)): Path<(String, String)>,
    Query(query): Query<RelationQuery>,
    Json(actions): Json<UpdateRelatedRowsActions>,
) -> Result<impl IntoResponse, AppError> {
    let relation = resolve_relation(&state.schema.snapshot(), &query.into_config(main_table))?;
    RelationsService::update_related_rows(&state.pool, &relation, &main_row_id, &actions).await?;
    tracing::info!(
        main_table = %relation.main_table.name,
        join_table = %relation.join_table.name,
        main_row_id = %main_row_id,
        added = actions.add_ids.len(),
        deleted = actions.delete_ids.len(),
        user = identity.principal(),
        "relations updated"
    );
    let rows = RelationsService::get_related_rows(&state.pool, &relation, &main_row_id).await?;
    Ok(success_many(rows))
}
