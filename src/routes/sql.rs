//! Admin SQL execution route, mounted under `/api`.

use crate::handlers::sql::execute_sql;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn sql_routes(state: AppState) -> Router {
    Router::new()
        .route("/sql/execute", post(execute_sql))
        .with_state(state)
}
