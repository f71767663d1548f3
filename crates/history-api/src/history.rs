//! Read-only history endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use history_core::{entry::HistoryEntry, key::parse_key_segment, store::HistoryStore};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  /// Maximum number of entries, newest first. Unbounded when absent.
  pub limit: Option<usize>,
}

/// `GET /-/history-json/{table}[?limit=N]`
pub async fn table<S>(
  State(store): State<Arc<S>>,
  Path(table): Path<String>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: HistoryStore,
{
  let entries = store
    .history(&table, params.limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

/// `GET /-/history-json/{table}/{pk}[?limit=N]`
pub async fn row<S>(
  State(store): State<Arc<S>>,
  Path((table, pk)): Path<(String, String)>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: HistoryStore,
{
  let entries = store
    .row_history(&table, parse_key_segment(&pk), params.limit)
    .await
    .map_err(ApiError::store)?;

  if entries.is_empty() {
    return Err(ApiError::NotFound(format!(
      "no history for row {pk} in table {table:?}"
    )));
  }
  Ok(Json(entries))
}
