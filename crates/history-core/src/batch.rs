//! Batch write requests executed under a single change group.
//!
//! A batch is a list of sub-requests addressed by path:
//!
//! | Path | Action |
//! |------|--------|
//! | `/<table>/-/insert` | body `{"row": {...}}` or `{"rows": [...]}`, optional `replace` / `ignore` |
//! | `/<table>/-/upsert` | body `{"row": {...}}` or `{"rows": [...]}` |
//! | `/<table>/<pk>/-/update` | body `{"update": {...}}` |
//! | `/<table>/<pk>/-/delete` | no body |
//!
//! Compound keys are comma-separated in the `<pk>` segment.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, Result, key::parse_key_segment};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
  pub requests: Vec<SubRequest>,
  /// Stored on the change group shared by every write in the batch.
  #[serde(default)]
  pub note:     Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubRequest {
  /// Informational; the action is taken from the path.
  #[serde(default)]
  pub method: Option<String>,
  pub path:   String,
  #[serde(default)]
  pub body:   Option<Value>,
}

/// Per-sub-request outcome, shaped like an HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResult {
  pub status: u16,
  pub body:   Value,
}

impl SubResult {
  pub fn ok(status: u16) -> Self { Self { status, body: json!({ "ok": true }) } }

  pub fn failed(message: impl Into<String>) -> Self {
    Self {
      status: 400,
      body:   json!({ "ok": false, "errors": [message.into()] }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
  /// `None` only when the batch was empty and no group was created.
  pub group_id: Option<i64>,
  pub results:  Vec<SubResult>,
}

// ─── Parsed operations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
  Insert,
  Upsert,
  Update,
  Delete,
}

impl BatchAction {
  /// Status reported for a successful sub-request.
  pub fn success_status(self) -> u16 {
    match self {
      BatchAction::Insert | BatchAction::Upsert => 201,
      BatchAction::Update | BatchAction::Delete => 200,
    }
  }
}

/// A sub-request with its path resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
  pub table:  String,
  pub action: BatchAction,
  /// Empty for insert and upsert.
  pub key:    Vec<Value>,
  pub body:   Value,
}

impl BatchOperation {
  pub fn parse(request: &SubRequest) -> Result<Self> {
    let invalid = || Error::InvalidPath(request.path.clone());

    let parts: Vec<&str> = request.path.trim_matches('/').split('/').collect();
    let n = parts.len();
    if n < 3 || parts[n - 2] != "-" {
      return Err(invalid());
    }

    let (table, action, key) = match parts[n - 1] {
      "insert" | "upsert" => {
        let action = if parts[n - 1] == "insert" {
          BatchAction::Insert
        } else {
          BatchAction::Upsert
        };
        (parts[..n - 2].join("/"), action, Vec::new())
      }
      "update" | "delete" if n >= 4 => {
        let action = if parts[n - 1] == "update" {
          BatchAction::Update
        } else {
          BatchAction::Delete
        };
        (parts[0].to_owned(), action, parse_key_segment(&parts[1..n - 2].join("/")))
      }
      _ => return Err(invalid()),
    };

    if table.is_empty() {
      return Err(invalid());
    }

    Ok(Self {
      table,
      action,
      key,
      body: request.body.clone().unwrap_or_else(|| json!({})),
    })
  }

  /// Parse every sub-request up front so a bad path fails the whole batch
  /// before anything is written.
  pub fn parse_all(requests: &[SubRequest]) -> Result<Vec<Self>> {
    requests.iter().map(Self::parse).collect()
  }
}
