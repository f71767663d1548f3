//! Handler for `POST /-/history-json`.

use std::sync::Arc;

use axum::{Json, extract::State};
use history_core::{
  batch::{BatchOperation, BatchRequest},
  store::HistoryStore,
};
use serde_json::{Value, json};

use crate::error::ApiError;

/// Every path is parsed before anything runs, so one bad path rejects the
/// whole request. Per-operation failures are reported in `results` and do
/// not stop the rest.
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError>
where
  S: HistoryStore,
{
  let request: BatchRequest = serde_json::from_value(body)
    .map_err(|e| ApiError::BadRequest(format!("invalid batch request: {e}")))?;

  let operations = BatchOperation::parse_all(&request.requests)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let outcome = store
    .batch(request.note, operations)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(json!({
    "ok":       true,
    "group_id": outcome.group_id,
    "results":  outcome.results,
  })))
}
