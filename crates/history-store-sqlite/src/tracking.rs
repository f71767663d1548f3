//! Enabling, disabling, and inspecting history tracking on a table.

use history_core::entry::Operation;
use rusqlite::Connection;

use crate::{
  Error, Result,
  names::{
    GROUP_COLUMN, TRIGGER_VERSION, audit_table_name, legacy_trigger_name, parse_trigger_name,
    quote_ident,
  },
  schema::{TableSchema, has_column, table_exists},
  triggers,
};

const SAVEPOINT: &str = "history_json";

/// Run `f` inside a savepoint. Works at top level and nested inside a
/// caller's transaction; on error everything `f` did is rolled back.
pub fn atomically<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
  conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
  match f(conn) {
    Ok(value) => {
      conn.execute_batch(&format!("RELEASE {SAVEPOINT}"))?;
      Ok(value)
    }
    Err(e) => {
      if let Err(rollback) =
        conn.execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
      {
        tracing::warn!(error = %rollback, "failed to roll back savepoint");
      }
      Err(e)
    }
  }
}

// ─── Trigger revisions ───────────────────────────────────────────────────────

/// Which generation of triggers, if any, tracks a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRevision {
  /// No tracking triggers.
  Untracked,
  /// Unversioned names, no change-group stamp.
  Ungrouped,
  /// Unversioned names that stamp the change group.
  V1,
  /// Versioned names carrying this tag.
  Versioned(u32),
}

impl TriggerRevision {
  pub fn is_current(self) -> bool { self == TriggerRevision::Versioned(TRIGGER_VERSION) }

  pub fn is_tracked(self) -> bool { self != TriggerRevision::Untracked }

  /// Tracked by triggers older than the current revision.
  pub fn is_outdated(self) -> bool {
    match self {
      TriggerRevision::Untracked => false,
      TriggerRevision::Ungrouped | TriggerRevision::V1 => true,
      TriggerRevision::Versioned(version) => version < TRIGGER_VERSION,
    }
  }
}

/// A tracking trigger on some table, as found in `sqlite_master`.
#[derive(Debug, Clone)]
pub struct TrackingTrigger {
  pub name:    String,
  /// `None` for unversioned names.
  pub version: Option<u32>,
  pub sql:     String,
}

/// Every tracking trigger attached to `table`, of any revision.
pub fn tracking_triggers(conn: &Connection, table: &str) -> Result<Vec<TrackingTrigger>> {
  let mut stmt = conn.prepare(
    "SELECT name, coalesce(sql, '') FROM sqlite_master WHERE type = 'trigger' AND tbl_name = ?1 \
     ORDER BY name",
  )?;
  let rows = stmt
    .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let legacy: Vec<String> =
    Operation::ALL.iter().map(|op| legacy_trigger_name(*op, table)).collect();

  Ok(
    rows
      .into_iter()
      .filter_map(|(name, sql)| {
        let version = match parse_trigger_name(&name) {
          Some((version, _, on)) if on == table => Some(version),
          _ if legacy.contains(&name) => None,
          _ => return None,
        };
        Some(TrackingTrigger { name, version, sql })
      })
      .collect(),
  )
}

/// Detect the trigger revision from trigger names and source text.
pub fn tracking_revision(conn: &Connection, table: &str) -> Result<TriggerRevision> {
  let triggers = tracking_triggers(conn, table)?;

  if let Some(version) = triggers.iter().filter_map(|t| t.version).max() {
    return Ok(TriggerRevision::Versioned(version));
  }
  if triggers.is_empty() {
    return Ok(TriggerRevision::Untracked);
  }

  let group_ref = quote_ident(GROUP_COLUMN);
  let stamps_group = triggers
    .iter()
    .any(|t| t.sql.contains(&group_ref) || t.sql.contains(&format!("[{GROUP_COLUMN}]")));
  Ok(if stamps_group { TriggerRevision::V1 } else { TriggerRevision::Ungrouped })
}

// ─── Enable / disable ────────────────────────────────────────────────────────

/// Create the change-group table if missing.
pub fn ensure_groups_table(conn: &Connection) -> Result<()> {
  conn.execute_batch(&triggers::groups_table_sql())?;
  Ok(())
}

/// Create the audit table, or add the group column to an older one.
fn ensure_audit_table(conn: &Connection, schema: &TableSchema) -> Result<()> {
  let audit = audit_table_name(&schema.name);
  if !table_exists(conn, &audit)? {
    let sql = triggers::audit_table_sql(schema);
    tracing::debug!(%sql, "creating audit table");
    conn.execute_batch(&sql)?;
  } else if !has_column(conn, &audit, GROUP_COLUMN)? {
    conn.execute_batch(&triggers::add_group_column_sql(&audit))?;
  }
  Ok(())
}

/// Drop every tracking trigger on `table`; returns how many were dropped.
pub fn drop_tracking_triggers(conn: &Connection, table: &str) -> Result<usize> {
  let found = tracking_triggers(conn, table)?;
  for trigger in &found {
    conn.execute_batch(&triggers::drop_trigger_sql(&trigger.name))?;
  }
  Ok(found.len())
}

/// Replace whatever triggers track the table with the current revision.
pub fn install_triggers(conn: &Connection, schema: &TableSchema) -> Result<()> {
  drop_tracking_triggers(conn, &schema.name)?;
  for op in Operation::ALL {
    let sql = triggers::trigger_sql(op, schema);
    tracing::debug!(%sql, "creating {op} trigger");
    conn.execute_batch(&sql)?;
  }
  Ok(())
}

/// Start tracking `table`. Safe to call repeatedly; re-running after an
/// `ALTER TABLE` regenerates the triggers against the new columns.
///
/// With `populate` set, a freshly created (empty) audit log is seeded with
/// the table's current rows.
pub fn enable_tracking(conn: &Connection, table: &str, populate: bool) -> Result<()> {
  let schema = TableSchema::read(conn, table)?;
  schema.require_pk()?;

  let seeded = atomically(conn, |conn| {
    ensure_groups_table(conn)?;
    ensure_audit_table(conn, &schema)?;
    install_triggers(conn, &schema)?;
    for sql in triggers::index_sql(&schema) {
      conn.execute_batch(&sql)?;
    }
    if populate && audit_is_empty(conn, table)? {
      return Ok(Some(conn.execute(&triggers::populate_sql(&schema), [])?));
    }
    Ok(None)
  })?;

  tracing::info!(table, seeded = seeded.unwrap_or(0), "enabled history tracking");
  Ok(())
}

/// Stop tracking `table`. The audit log is kept.
pub fn disable_tracking(conn: &Connection, table: &str) -> Result<()> {
  let dropped = atomically(conn, |conn| drop_tracking_triggers(conn, table))?;
  if dropped > 0 {
    tracing::info!(table, "disabled history tracking");
  }
  Ok(())
}

/// Snapshot every current row of `table` as an `insert` entry; returns the
/// number of entries written. Running it twice writes the rows twice.
pub fn populate(conn: &Connection, table: &str) -> Result<usize> {
  let schema = TableSchema::read(conn, table)?;
  schema.require_pk()?;
  atomically(conn, |conn| {
    ensure_groups_table(conn)?;
    ensure_audit_table(conn, &schema)?;
    Ok(conn.execute(&triggers::populate_sql(&schema), [])?)
  })
}

fn audit_is_empty(conn: &Connection, table: &str) -> Result<bool> {
  let sql = format!(
    "SELECT NOT EXISTS (SELECT 1 FROM {})",
    quote_ident(&audit_table_name(table))
  );
  Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

/// Fail with [`Error::NotTracked`] unless an audit table exists for `table`.
pub fn require_audit_table(conn: &Connection, table: &str) -> Result<String> {
  let audit = audit_table_name(table);
  if table_exists(conn, &audit)? {
    Ok(audit)
  } else {
    Err(Error::NotTracked(table.to_owned()))
  }
}
