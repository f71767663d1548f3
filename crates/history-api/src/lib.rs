//! HTTP surface for JSON history tracking.
//!
//! Exposes an axum [`Router`] backed by any [`HistoryStore`]: the batch
//! write endpoint, which runs every sub-request under one change group, and
//! read-only history endpoints. Auth and TLS are the caller's concern.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/-/history-json` | Body: [`BatchRequest`](history_core::batch::BatchRequest) |
//! | `GET`  | `/-/history-json/{table}` | `?limit=N`; newest first |
//! | `GET`  | `/-/history-json/{table}/{pk}` | Compound keys comma-separated |

pub mod batch;
pub mod error;
pub mod history;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use history_core::store::HistoryStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HISTORY_JSON_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  pub database_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8001 }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `store`.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: HistoryStore + 'static,
{
  Router::new()
    .route("/-/history-json", post(batch::handler::<S>))
    .route("/-/history-json/{table}", get(history::table::<S>))
    .route("/-/history-json/{table}/{pk}", get(history::row::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}
