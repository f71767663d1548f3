//! Upgrade actions for audit tables written by older trigger revisions.

use serde::{Deserialize, Serialize};

/// What an upgrade pass must do (or did) for one audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeAction {
  pub audit_table:    String,
  pub source_table:   String,
  /// The audit table lacks the `group` column.
  pub needs_column:   bool,
  /// The source table's triggers predate the current revision.
  pub needs_triggers: bool,
  /// Triggers can only be regenerated while the source table exists.
  pub source_exists:  bool,
}

impl UpgradeAction {
  /// Human-readable steps, in either planned or completed tense.
  pub fn steps(&self, done: bool) -> Vec<&'static str> {
    let mut steps = Vec::new();
    if self.needs_column {
      steps.push(if done { "added [group] column" } else { "add [group] column" });
    }
    if self.needs_triggers {
      steps.push(if done { "recreated triggers" } else { "recreate triggers" });
    }
    steps
  }
}
