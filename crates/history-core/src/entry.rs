//! Audit-log entries as returned by history queries.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

// ─── Operation ───────────────────────────────────────────────────────────────

/// The row-level write an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Insert,
  Update,
  Delete,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Operation::Insert => "insert",
      Operation::Update => "update",
      Operation::Delete => "delete",
    }
  }

  pub const ALL: [Operation; 3] =
    [Operation::Insert, Operation::Update, Operation::Delete];
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Operation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "insert" => Ok(Operation::Insert),
      "update" => Ok(Operation::Update),
      "delete" => Ok(Operation::Delete),
      other => Err(Error::UnknownOperation(other.to_owned())),
    }
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// One row of a table's audit log, enriched with its change-group metadata.
///
/// `updated_values` is the raw parsed JSON from the log: `{"null": 1}` and
/// `{"hex": ...}` markers are passed through untouched. It is `None` for
/// deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub id:             i64,
  /// Capture time, `YYYY-MM-DD HH:MM:SS.fff` in UTC, assigned by the store.
  pub timestamp:      String,
  pub operation:      Operation,
  /// Primary-key column name to value, in key order.
  #[serde(rename = "pk")]
  pub primary_key:    Map<String, Value>,
  pub updated_values: Option<Value>,
  pub group:          Option<i64>,
  pub group_note:     Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn operation_parses_its_own_names() {
    for op in Operation::ALL {
      assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
    }
    assert!("upsert".parse::<Operation>().is_err());
  }

  #[test]
  fn entry_serialises_key_under_pk() {
    let mut pk = Map::new();
    pk.insert("id".into(), json!(1));
    let entry = HistoryEntry {
      id: 3,
      timestamp: "2024-01-01 00:00:00.000".into(),
      operation: Operation::Delete,
      primary_key: pk,
      updated_values: None,
      group: None,
      group_note: None,
    };
    let v = serde_json::to_value(&entry).unwrap();
    assert_eq!(v["pk"], json!({"id": 1}));
    assert_eq!(v["operation"], json!("delete"));
    assert!(v["updated_values"].is_null());
    assert!(v["group_note"].is_null());
  }
}
