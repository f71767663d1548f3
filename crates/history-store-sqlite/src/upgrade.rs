//! In-place upgrade of databases written by older trigger revisions.
//!
//! Older audit tables may lack the `group` column, and older triggers may
//! not stamp it. Both are fixed without touching existing audit rows, which
//! keep a NULL group.

use history_core::upgrade::UpgradeAction;
use rusqlite::Connection;

use crate::{
  Result,
  names::{AUDIT_PREFIX, GROUP_COLUMN, GROUPS_TABLE},
  schema::{TableSchema, has_column, table_exists},
  tracking::{atomically, ensure_groups_table, install_triggers, tracking_revision},
  triggers::add_group_column_sql,
};

/// Every audit table in the database, by name.
pub fn find_audit_tables(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '\\_history\\_json\\_%' \
     ESCAPE '\\' AND name <> ?1 ORDER BY name",
  )?;
  let names = stmt
    .query_map([GROUPS_TABLE], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

/// Report what an upgrade would change. Tables already up to date are
/// omitted.
pub fn detect_upgrades(conn: &Connection) -> Result<Vec<UpgradeAction>> {
  let mut actions = Vec::new();
  for audit_table in find_audit_tables(conn)? {
    let source_table = audit_table[AUDIT_PREFIX.len()..].to_owned();
    let source_exists = table_exists(conn, &source_table)?;
    let needs_column = !has_column(conn, &audit_table, GROUP_COLUMN)?;
    let needs_triggers =
      source_exists && tracking_revision(conn, &source_table)?.is_outdated();

    if needs_column || needs_triggers {
      actions.push(UpgradeAction {
        audit_table,
        source_table,
        needs_column,
        needs_triggers,
        source_exists,
      });
    }
  }
  Ok(actions)
}

/// Apply every detected upgrade and return what was done. Each table is
/// upgraded in its own savepoint; running again finds nothing to do.
pub fn apply_upgrade(conn: &Connection) -> Result<Vec<UpgradeAction>> {
  let actions = detect_upgrades(conn)?;
  if actions.is_empty() {
    return Ok(actions);
  }

  ensure_groups_table(conn)?;
  for action in &actions {
    atomically(conn, |conn| {
      if action.needs_column {
        conn.execute_batch(&add_group_column_sql(&action.audit_table))?;
      }
      if action.needs_triggers {
        install_triggers(conn, &TableSchema::read(conn, &action.source_table)?)?;
      }
      Ok(())
    })?;
    tracing::info!(
      audit_table = %action.audit_table,
      steps = %action.steps(true).join(", "),
      "upgraded audit table"
    );
  }
  Ok(actions)
}
