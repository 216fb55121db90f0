//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures while reading the catalog. Any of these aborts the whole load.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("catalog query: {0}")]
    Catalog(#[from] sqlx::Error),
    #[error("column {column} references unknown table {table}")]
    OrphanColumn { table: String, column: String },
    #[error("invalid foreign key descriptor on {table}.{column}: {message}")]
    ForeignKey {
        table: String,
        column: String,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    SchemaLoad(#[from] SchemaError),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown {role} table: {table}")]
    RelationTableNotFound { role: &'static str, table: String },
    #[error("can't resolve {side} on join table {join_table}")]
    JoinColumnNotFound {
        side: &'static str,
        join_table: String,
    },
    #[error("no valid columns in row for table {0}")]
    NoValidColumns(String),
    #[error("refusing to delete from {0} with empty filters")]
    EmptyFilter(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::SchemaLoad(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::UnknownTable(_) | AppError::RelationTableNotFound { .. } => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AppError::JoinColumnNotFound { .. } => (StatusCode::BAD_REQUEST, "join_column_not_found"),
            AppError::NoValidColumns(_) => (StatusCode::BAD_REQUEST, "no_valid_columns"),
            AppError::EmptyFilter(_) => (StatusCode::BAD_REQUEST, "empty_filter"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let details = match &self {
            AppError::RelationTableNotFound { role, table } => {
                Some(serde_json::json!({ "role": role, "table": table }))
            }
            AppError::JoinColumnNotFound { side, join_table } => {
                Some(serde_json::json!({ "side": side, "joinTable": join_table }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
