//! Raw SQL execution handler.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::response::success_one_ok;
use crate::service::{SqlExecutionRequest, SqlExecutionService};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};

pub async fn execute_sql(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<SqlExecutionRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(user = identity.principal(), "sql execute");
    let res = SqlExecutionService::execute(&state.pool, &req).await?;
    Ok(success_one_ok(res))
}
