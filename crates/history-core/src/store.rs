//! The `HistoryStore` trait.
//!
//! Implemented by storage backends (e.g. `history-store-sqlite`). The HTTP
//! layer depends on this abstraction rather than on a concrete backend.

use std::future::Future;

use serde_json::Value;

use crate::{
  Classify,
  batch::{BatchOperation, BatchOutcome},
  entry::HistoryEntry,
  restore::RestoreOptions,
  upgrade::UpgradeAction,
};

/// Abstraction over a history-tracking backend.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime (e.g. tokio with `axum`).
pub trait HistoryStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Tracking ──────────────────────────────────────────────────────────

  /// Install the audit table and triggers for `table`. Idempotent. When
  /// `populate` is set and the audit log is empty, the current rows are
  /// snapshotted as `insert` entries.
  fn enable_tracking<'a>(
    &'a self,
    table: &'a str,
    populate: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Drop the triggers for `table`, keeping its audit log. Idempotent.
  fn disable_tracking<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Audit entries for `table`, newest first.
  fn history<'a>(
    &'a self,
    table: &'a str,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  /// Audit entries for one row, newest first. `key` holds one value per
  /// primary-key column, in key order.
  fn row_history<'a>(
    &'a self,
    table: &'a str,
    key: Vec<Value>,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  /// The parameterised SQL that folds one row's audit entries into its JSON
  /// state at a given entry id.
  fn row_state_query<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Evaluate the row-state query. `Ok(None)` when the row had no insert at
  /// or before `target_id`; `Ok(Some(Value::Null))` when it was deleted.
  fn row_state<'a>(
    &'a self,
    table: &'a str,
    key: Vec<Value>,
    target_id: i64,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Replay the audit log into a table; returns the resulting table name.
  fn restore<'a>(
    &'a self,
    table: &'a str,
    options: RestoreOptions,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Run every operation in one transaction under one change group.
  fn batch(
    &self,
    note: Option<String>,
    operations: Vec<BatchOperation>,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  /// Bring audit tables written by older revisions up to date.
  fn upgrade(
    &self,
  ) -> impl Future<Output = Result<Vec<UpgradeAction>, Self::Error>> + Send + '_;
}
