//! Route tables and the assembled application router.

mod common;
mod data;
mod schema;
mod sql;

pub use common::common_routes;
pub use data::data_routes;
pub use schema::schema_routes;
pub use sql::sql_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Full application: common routes at the root, everything else under `/api`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;
    let api = Router::new()
        .merge(data_routes(state.clone()))
        .merge(schema_routes(state.clone()))
        .merge(sql_routes(state.clone()));
    Router::new()
        .merge(common_routes(state))
        .nest("/api", api)
        .layer(RequestBodyLimitLayer::new(body_limit))
}
