//! Liveness and table listing endpoints.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use super::super::AppState;
use super::error_response;

/// Root liveness probe.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "message": "catalog-enrich server is running",
    }))
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// All rows of one table.
pub async fn get_table_data(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> impl IntoResponse {
    info!("Listing rows of {}", table_name);
    match state.orchestrator.get_table_data(&table_name).await {
        Ok(data) => Json(json!({
            "status": "success",
            "data": data.rows,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
