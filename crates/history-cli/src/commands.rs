//! Command implementations. Each writes its payload to `out` and status
//! messages to `err`.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use history_core::{
  key::coerce_key_value,
  restore::{RestoreOptions, RestoreTarget, parse_timestamp},
};
use history_store_sqlite::{
  apply_upgrade, detect_upgrades, disable_tracking, enable_tracking, get_history,
  get_row_history,
  names::quote_ident,
  restore, retarget_create_statement, row_state_query,
  schema::{column_names, create_statement},
};
use rusqlite::Connection;
use serde_json::Value;

use crate::Command;

const OUTPUT_SCHEMA: &str = "output_db";

pub fn run(
  database: &Path,
  command: Command,
  out: &mut impl Write,
  err: &mut impl Write,
) -> Result<()> {
  let conn = Connection::open(database)
    .with_context(|| format!("failed to open database {}", database.display()))?;

  match command {
    Command::Enable { table, no_populate } => {
      enable_tracking(&conn, &table, !no_populate)?;
      writeln!(err, "Tracking enabled for table '{table}'.")?;
    }

    Command::Disable { table } => {
      disable_tracking(&conn, &table)?;
      writeln!(err, "Tracking disabled for table '{table}'.")?;
    }

    Command::History { table, limit } => {
      let entries = get_history(&conn, &table, limit)?;
      write_json(out, &entries)?;
    }

    Command::RowHistory { table, pk_values, limit } => {
      let key: Vec<Value> = pk_values.iter().map(|v| coerce_key_value(v)).collect();
      let entries = get_row_history(&conn, &table, &key, limit)?;
      write_json(out, &entries)?;
    }

    Command::Restore { table, id, timestamp, new_table, replace_table, output_db } => {
      let options = RestoreOptions {
        timestamp: timestamp.as_deref().map(parse_timestamp).transpose()?,
        up_to_id:  id,
        target:    match new_table {
          _ if replace_table => RestoreTarget::Swap,
          Some(name) => RestoreTarget::Named(name),
          None => RestoreTarget::Default,
        },
      };

      if let Some(path) = output_db {
        restore_to_database(&conn, &table, options, &path)?;
        writeln!(err, "Restored table '{table}' written to '{}'.", path.display())?;
      } else {
        let restored = restore(&conn, &table, &options)?;
        if replace_table {
          writeln!(err, "Table '{table}' replaced with restored data.")?;
        } else {
          writeln!(err, "Restored table created as '{restored}'.")?;
        }
      }
    }

    Command::RowStateSql { table } => {
      writeln!(out, "{}", row_state_query(&conn, &table)?)?;
    }

    Command::Upgrade { dry_run } => {
      let (actions, verb) = if dry_run {
        (detect_upgrades(&conn)?, "Would upgrade")
      } else {
        (apply_upgrade(&conn)?, "Upgraded")
      };
      if actions.is_empty() {
        writeln!(err, "Nothing to upgrade.")?;
      }
      for action in &actions {
        writeln!(
          err,
          "{verb} {}: {}",
          action.audit_table,
          action.steps(!dry_run).join(", ")
        )?;
      }
    }
  }

  Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
  serde_json::to_writer_pretty(&mut *out, value)?;
  writeln!(out)?;
  Ok(())
}

/// Replay into a scratch table, then copy it into `path` under the tracked
/// table's own name and definition.
fn restore_to_database(
  conn: &Connection,
  table: &str,
  options: RestoreOptions,
  path: &Path,
) -> Result<()> {
  let columns = column_names(conn, table)?
    .iter()
    .map(|c| quote_ident(c))
    .collect::<Vec<_>>()
    .join(", ");
  let create_sql = create_statement(conn, table)?;

  let scratch = restore(
    conn,
    table,
    &options.with_target(RestoreTarget::Named(format!("_cli_restore_tmp_{table}"))),
  )?;

  conn
    .execute(
      &format!("ATTACH DATABASE ?1 AS {OUTPUT_SCHEMA}"),
      [path.to_string_lossy().into_owned()],
    )
    .with_context(|| format!("failed to attach {}", path.display()))?;

  let target = format!("{}.{}", quote_ident(OUTPUT_SCHEMA), quote_ident(table));
  let copied = retarget_create_statement(&create_sql, table, &target)
    .map_err(anyhow::Error::from)
    .and_then(|sql| {
      conn.execute_batch(&sql)?;
      conn.execute_batch(&format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM main.{}",
        quote_ident(&scratch)
      ))?;
      Ok(())
    });

  conn.execute_batch(&format!("DROP TABLE IF EXISTS main.{}", quote_ident(&scratch)))?;
  conn.execute_batch(&format!("DETACH DATABASE {OUTPUT_SCHEMA}"))?;
  copied
}
