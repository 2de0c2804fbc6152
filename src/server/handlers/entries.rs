//! Generate-entry endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::super::AppState;
use super::{error_response, kind_response};
use crate::services::{EntryOutcome, ErrorKind};

/// Body of `POST /api/generate-entry`.
#[derive(Debug, Deserialize)]
pub struct GenerateEntryRequest {
    pub supplier_name: String,
    pub product_name: String,
    pub table_name: Option<String>,
}

/// Run the enrichment pipeline for one supplier/product pair.
///
/// A rejection by the model's own review is a normal outcome and answers
/// 200 with `status: "error"`; pipeline failures use the status of their
/// error kind. An unreadable body is a `format` error.
pub async fn generate_entry(
    State(state): State<AppState>,
    body: Result<Json<GenerateEntryRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected generate-entry body: {}", rejection.body_text());
            return kind_response(ErrorKind::Format, rejection.body_text());
        }
    };
    let table = request
        .table_name
        .as_deref()
        .unwrap_or(&state.default_table);

    let outcome = state
        .orchestrator
        .generate_entry(&request.supplier_name, &request.product_name, table)
        .await;

    match outcome {
        EntryOutcome::Persisted(entry) => Json(json!({
            "status": "success",
            "message": "Entry generated and inserted successfully",
            "source_url": entry.source_url,
            "row": entry.row,
        }))
        .into_response(),
        EntryOutcome::RejectedByValidation(review) => Json(json!({
            "status": "error",
            "message": "Generated data failed validation",
            "validation_details": review,
        }))
        .into_response(),
        EntryOutcome::Failed(e) => error_response(&e),
    }
}
