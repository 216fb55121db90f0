//! Schema and settings routes, mounted under `/api`.

use crate::handlers::schema::{
    get_schema_names, get_stats, get_table, get_table_settings, get_tables, update_table_settings,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn schema_routes(state: AppState) -> Router {
    Router::new()
        .route("/schema/tables", get(get_tables))
        .route("/schema/tables/:table", get(get_table))
        .route("/schema/names", get(get_schema_names))
        .route("/schema/stats", get(get_stats))
        .route(
            "/schema/settings/:table",
            get(get_table_settings).patch(update_table_settings),
        )
        .with_state(state)
}
