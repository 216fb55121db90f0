//! Schema introspection and table settings handlers.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::response::success_one_ok;
use crate::schema::{load_schema_names, schema_stats};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct TablesQuery {
    #[serde(default)]
    pub reload: bool,
}

/// The published tables map; `?reload=true` re-introspects first.
pub async fn get_tables(
    State(state): State<AppState>,
    Query(query): Query<TablesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tables = if query.reload {
        state.schema.reload(&state.pool).await?
    } else {
        state.schema.snapshot()
    };
    Ok(success_one_ok(tables))
}

pub async fn get_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(state.schema.table(&table)?))
}

pub async fn get_schema_names(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let names = load_schema_names(&state.pool).await?;
    Ok(success_one_ok(names))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = schema_stats(&state.pool, state.schema.schema_name()).await?;
    Ok(success_one_ok(stats))
}

pub async fn get_table_settings(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    Ok(success_one_ok(state.settings.get(&table)))
}

pub async fn update_table_settings(
    State(state): State<AppState>,
    identity: Identity,
    Path(table): Path<String>,
    Json(partial): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let table = state.schema.table(&table)?;
    let settings = state.settings.update(&state.pool, &table, &partial).await?;
    tracing::info!(table = %table.name, user = identity.principal(), "settings patched");
    Ok(success_one_ok(settings))
}
