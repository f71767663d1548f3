//! Change groups: a shared tag stamped onto every audit row written while
//! the group is current.
//!
//! The "current" marker lives in the database, not the connection, so any
//! trigger firing on any tracked table picks it up. Only one group can be
//! current at a time; callers running batches from several connections
//! must serialise them.

use rusqlite::Connection;

use crate::{
  Error, Result,
  names::{GROUPS_TABLE, quote_ident},
  tracking::ensure_groups_table,
};

/// An open change group. Ending it (explicitly or by drop) clears the
/// current marker; the group row itself is kept.
#[must_use = "the group stays current until ended or dropped"]
pub struct ChangeGroup<'c> {
  conn:     &'c Connection,
  id:       i64,
  finished: bool,
}

impl<'c> ChangeGroup<'c> {
  /// Create a group and make it current. A marker left behind by a crashed
  /// writer is cleared first.
  pub fn begin(conn: &'c Connection, note: Option<&str>) -> Result<Self> {
    ensure_groups_table(conn)?;
    let groups = quote_ident(GROUPS_TABLE);

    let stale = conn.execute(
      &format!("UPDATE {groups} SET current = NULL WHERE current = 1"),
      [],
    )?;
    if stale > 0 {
      tracing::warn!("cleared a stale current change group");
    }

    conn.execute(
      &format!("INSERT INTO {groups} (note, current) VALUES (?1, 1)"),
      [note],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(group = id, "began change group");

    Ok(Self { conn, id, finished: false })
  }

  pub fn id(&self) -> i64 { self.id }

  pub fn set_note(&self, note: Option<&str>) -> Result<()> {
    self.conn.execute(
      &format!("UPDATE {} SET note = ?1 WHERE id = ?2", quote_ident(GROUPS_TABLE)),
      rusqlite::params![note, self.id],
    )?;
    Ok(())
  }

  /// Clear the current marker and report any failure doing so.
  pub fn end(mut self) -> Result<()> {
    self.finished = true;
    self.clear()
  }

  fn clear(&self) -> Result<()> {
    self.conn.execute(
      &format!(
        "UPDATE {} SET current = NULL WHERE id = ?1",
        quote_ident(GROUPS_TABLE)
      ),
      [self.id],
    )?;
    tracing::debug!(group = self.id, "ended change group");
    Ok(())
  }
}

impl Drop for ChangeGroup<'_> {
  fn drop(&mut self) {
    if !self.finished {
      if let Err(e) = self.clear() {
        tracing::warn!(group = self.id, error = %e, "failed to clear current change group");
      }
    }
  }
}

/// Run `f` with a change group current, passing it the group id. The
/// marker is cleared whether or not `f` succeeds.
pub fn change_group<T, E>(
  conn: &Connection,
  note: Option<&str>,
  f: impl FnOnce(i64) -> Result<T, E>,
) -> Result<T, E>
where
  E: From<Error>,
{
  let group = ChangeGroup::begin(conn, note)?;
  match f(group.id()) {
    Ok(value) => {
      group.end()?;
      Ok(value)
    }
    Err(e) => {
      drop(group);
      Err(e)
    }
  }
}
