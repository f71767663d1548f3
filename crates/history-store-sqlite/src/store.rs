//! [`SqliteHistory`]: the async [`HistoryStore`] over one SQLite file.

use std::path::Path;

use history_core::{
  batch::{BatchOperation, BatchOutcome},
  entry::HistoryEntry,
  restore::RestoreOptions,
  store::HistoryStore,
  upgrade::UpgradeAction,
};
use rusqlite::Connection;
use serde_json::Value;

use crate::{Error, Result, batch, history, restore, row_state, tracking, upgrade};

// ─── Store ───────────────────────────────────────────────────────────────────

/// History tracking for the tables of one SQLite database.
///
/// Cloning is cheap; every clone shares the same background connection, so
/// writes (and therefore change groups) are serialised.
#[derive(Clone)]
pub struct SqliteHistory {
  conn: tokio_rusqlite::Connection,
}

impl SqliteHistory {
  /// Open (or create) the database at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an in-memory database. Useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Run `f` on the connection thread. Used for setup that has no
  /// [`HistoryStore`] method, such as creating the tables to track.
  pub async fn with_connection<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

impl HistoryStore for SqliteHistory {
  type Error = Error;

  // ── Tracking ──────────────────────────────────────────────────────────────

  async fn enable_tracking(&self, table: &str, populate: bool) -> Result<()> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| tracking::enable_tracking(conn, &table, populate))
      .await
  }

  async fn disable_tracking(&self, table: &str) -> Result<()> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| tracking::disable_tracking(conn, &table))
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn history(&self, table: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| history::get_history(conn, &table, limit))
      .await
  }

  async fn row_history(
    &self,
    table: &str,
    key: Vec<Value>,
    limit: Option<usize>,
  ) -> Result<Vec<HistoryEntry>> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| history::get_row_history(conn, &table, &key, limit))
      .await
  }

  async fn row_state_query(&self, table: &str) -> Result<String> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| row_state::row_state_query(conn, &table))
      .await
  }

  async fn row_state(
    &self,
    table: &str,
    key: Vec<Value>,
    target_id: i64,
  ) -> Result<Option<Value>> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| row_state::row_state(conn, &table, &key, target_id))
      .await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn restore(&self, table: &str, options: RestoreOptions) -> Result<String> {
    let table = table.to_owned();
    self
      .with_connection(move |conn| restore::restore(conn, &table, &options))
      .await
  }

  async fn batch(
    &self,
    note: Option<String>,
    operations: Vec<BatchOperation>,
  ) -> Result<BatchOutcome> {
    self
      .with_connection(move |conn| batch::run_batch(conn, note.as_deref(), &operations))
      .await
  }

  async fn upgrade(&self) -> Result<Vec<UpgradeAction>> {
    self
      .with_connection(|conn| upgrade::apply_upgrade(conn))
      .await
  }
}
