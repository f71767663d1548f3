//! Rebuilding a table from its audit log.
//!
//! Entries are replayed oldest first into a fresh table created from the
//! tracked table's *current* definition:
//!
//! - `insert` writes the full row; columns missing from the entry are NULL,
//!   entry keys that are no longer columns are ignored.
//! - `update` sets every column named in the entry. A column that has since
//!   been dropped makes the restore fail, and nothing is kept.
//! - `delete` removes the row.

use history_core::{
  entry::Operation,
  restore::{RestoreOptions, RestoreTarget},
};
use rusqlite::{Connection, named_params, params_from_iter, types::Value as SqlValue};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  encode::{decode_value, parse_updated_values},
  names::{audit_pk_column, quote_ident},
  schema::{Column, TableSchema, create_statement},
  tracking::{atomically, install_triggers, require_audit_table, tracking_revision},
};

/// One audit row, read ahead of replay.
struct Entry {
  operation: Operation,
  values:    Option<Map<String, Value>>,
  key:       Vec<SqlValue>,
}

/// Replay the audit log for `table` up to the bounds in `options`; returns
/// the name of the table holding the result.
pub fn restore(conn: &Connection, table: &str, options: &RestoreOptions) -> Result<String> {
  let schema = TableSchema::read(conn, table)?;
  let audit = require_audit_table(conn, table)?;
  let create_sql = create_statement(conn, table)?;

  let swap = match &options.target {
    RestoreTarget::Swap => true,
    RestoreTarget::Named(name) => name == table,
    RestoreTarget::Default => false,
  };
  let target = match &options.target {
    _ if swap => format!("_tmp_restore_{table}"),
    RestoreTarget::Named(name) => name.clone(),
    _ => format!("{table}_restored"),
  };

  let replayed = atomically(conn, |conn| {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&target)))?;
    conn.execute_batch(&retarget_create_statement(
      &create_sql,
      table,
      &quote_ident(&target),
    )?)?;

    let entries = read_entries(conn, &audit, &schema, options)?;
    let count = entries.len();
    for entry in entries {
      apply(conn, &target, &schema, entry)?;
    }

    if swap {
      swap_into_place(conn, table, &target)?;
    }
    Ok(count)
  })?;

  let result = if swap { table.to_owned() } else { target };
  tracing::info!(table, restored = %result, entries = replayed, "restored table from history");
  Ok(result)
}

fn read_entries(
  conn: &Connection,
  audit: &str,
  schema: &TableSchema,
  options: &RestoreOptions,
) -> Result<Vec<Entry>> {
  let pk = schema.pk_columns();
  let mirrors: String = pk
    .iter()
    .map(|c| format!(", {}", quote_ident(&audit_pk_column(&c.name))))
    .collect();

  let sql = format!(
    "SELECT operation, updated_values{mirrors} FROM {} WHERE (:ts IS NULL OR timestamp <= :ts) \
     AND (:id IS NULL OR id <= :id) ORDER BY id",
    quote_ident(audit)
  );
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query(named_params! {
    ":ts": options.timestamp_bound(),
    ":id": options.up_to_id,
  })?;

  let mut entries = Vec::new();
  while let Some(row) = rows.next()? {
    let operation: String = row.get(0)?;
    let operation = operation
      .parse::<Operation>()
      .map_err(|_| Error::UnknownOperation(operation.clone()))?;
    let values = parse_updated_values(row.get::<_, Option<String>>(1)?.as_deref())?;
    let key = (0..pk.len())
      .map(|i| row.get::<_, SqlValue>(2 + i))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    entries.push(Entry { operation, values, key });
  }
  Ok(entries)
}

/// `"a" = ?n AND "b" = ?n+1`, numbered from `first`.
fn key_filter(pk: &[&Column], first: usize) -> String {
  pk.iter()
    .enumerate()
    .map(|(i, c)| format!("{} = ?{}", quote_ident(&c.name), first + i))
    .collect::<Vec<_>>()
    .join(" AND ")
}

fn apply(conn: &Connection, target: &str, schema: &TableSchema, entry: Entry) -> Result<()> {
  let pk = schema.pk_columns();
  let target = quote_ident(target);

  match entry.operation {
    Operation::Insert => {
      let values = entry.values.unwrap_or_default();
      let mut columns = Vec::with_capacity(schema.columns.len());
      let mut params = entry.key;
      for col in &pk {
        columns.push(quote_ident(&col.name));
      }
      for col in schema.non_pk_columns() {
        columns.push(quote_ident(&col.name));
        params.push(match values.get(&col.name) {
          Some(v) => decode_value(v)?,
          None => SqlValue::Null,
        });
      }
      let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
      // A second insert for a live key means the row was replaced; the
      // implicit delete fires no trigger.
      conn
        .prepare_cached(&format!(
          "INSERT OR REPLACE INTO {target} ({}) VALUES ({})",
          columns.join(", "),
          placeholders.join(", ")
        ))?
        .execute(params_from_iter(params))?;
    }
    Operation::Update => {
      // Rows written before no-op suppression may carry an empty object.
      let Some(values) = entry.values.filter(|v| !v.is_empty()) else {
        return Ok(());
      };
      let mut sets = Vec::with_capacity(values.len());
      let mut params = Vec::with_capacity(values.len() + pk.len());
      for (i, (column, value)) in values.iter().enumerate() {
        sets.push(format!("{} = ?{}", quote_ident(column), i + 1));
        params.push(decode_value(value)?);
      }
      params.extend(entry.key);
      conn.execute(
        &format!(
          "UPDATE {target} SET {} WHERE {}",
          sets.join(", "),
          key_filter(&pk, values.len() + 1)
        ),
        params_from_iter(params),
      )?;
    }
    Operation::Delete => {
      conn
        .prepare_cached(&format!("DELETE FROM {target} WHERE {}", key_filter(&pk, 1)))?
        .execute(params_from_iter(entry.key))?;
    }
  }
  Ok(())
}

/// Move the replayed table into the tracked table's place. Renaming moves
/// the triggers onto the aside copy, so tracking is reinstalled at the
/// current revision.
fn swap_into_place(conn: &Connection, table: &str, replayed: &str) -> Result<()> {
  let tracked = tracking_revision(conn, table)?.is_tracked();
  let aside = quote_ident(&format!("_tmp_old_{table}"));

  conn.execute_batch(&format!(
    "DROP TABLE IF EXISTS {aside};\nALTER TABLE {live} RENAME TO {aside};\nALTER TABLE \
     {replayed} RENAME TO {live};\nDROP TABLE {aside};",
    live = quote_ident(table),
    replayed = quote_ident(replayed),
  ))?;

  if tracked {
    install_triggers(conn, &TableSchema::read(conn, table)?)?;
  }
  Ok(())
}

/// Rewrite the table name in a stored `CREATE TABLE` statement.
///
/// `target` is inserted verbatim, so it must already be quoted (and may be
/// schema-qualified). `table` is only used for error reporting.
pub fn retarget_create_statement(sql: &str, table: &str, target: &str) -> Result<String> {
  let unreadable = || Error::UnreadableSchema(table.to_owned());

  let rest = strip_keyword(sql.trim_start(), "CREATE").ok_or_else(unreadable)?;
  let rest = strip_keyword(rest, "TABLE").ok_or_else(unreadable)?;
  let name_len = name_token_len(rest).ok_or_else(unreadable)?;

  Ok(format!("CREATE TABLE {target}{}", &rest[name_len..]))
}

/// Strip a case-insensitive keyword plus the whitespace that follows it.
fn strip_keyword<'s>(s: &'s str, keyword: &str) -> Option<&'s str> {
  let head = s.get(..keyword.len())?;
  if !head.eq_ignore_ascii_case(keyword) {
    return None;
  }
  let rest = &s[keyword.len()..];
  let trimmed = rest.trim_start();
  (trimmed.len() < rest.len()).then_some(trimmed)
}

/// Byte length of the identifier token at the start of `s`.
fn name_token_len(s: &str) -> Option<usize> {
  let close = match s.chars().next()? {
    '"' => '"',
    '`' => '`',
    '\'' => '\'',
    '[' => return s.find(']').map(|i| i + 1),
    _ => {
      let end = s
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(s.len());
      return (end > 0).then_some(end);
    }
  };

  // Quoted: a doubled closing quote is an escaped quote.
  let bytes = s.as_bytes();
  let close = close as u8;
  let mut i = 1;
  while i < bytes.len() {
    if bytes[i] == close {
      if bytes.get(i + 1) == Some(&close) {
        i += 2;
        continue;
      }
      return Some(i + 1);
    }
    i += 1;
  }
  None
}
