//! HTTP request handlers for the web server.

mod api;
mod entries;

pub use api::{get_table_data, health, root};
pub use entries::generate_entry;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::{ErrorKind, PipelineError};

/// Error body shared by every endpoint: `{status, kind, message}`.
pub(super) fn error_response(err: &PipelineError) -> Response {
    kind_response(err.kind(), err.to_string())
}

pub(super) fn kind_response(kind: ErrorKind, message: String) -> Response {
    let status =
        StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "status": "error",
            "kind": kind.as_str(),
            "message": message,
        })),
    )
        .into_response()
}
