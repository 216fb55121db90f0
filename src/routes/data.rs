//! Table data routes, mounted under `/api`.

use crate::handlers::data::{
    delete_rows, get_related_rows, get_rows, get_table_view, insert_row, update_related_rows, update_rows,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/data/:table",
            get(get_rows).post(insert_row).put(update_rows).delete(delete_rows),
        )
        .route("/data/:table/view", get(get_table_view))
        .route(
            "/data/:table/relations/:main_row_id",
            get(get_related_rows).put(update_related_rows),
        )
        .with_state(state)
}
