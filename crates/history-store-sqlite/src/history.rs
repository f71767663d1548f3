//! Reading the audit log back, newest first.
//!
//! Everything is read from the audit table itself, so history stays
//! readable after the tracked table is dropped or altered.

use history_core::entry::{HistoryEntry, Operation};
use rusqlite::{Connection, params_from_iter};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  encode::{decode_value, sql_to_json},
  names::{GROUP_COLUMN, GROUPS_TABLE, quote_ident},
  schema::{column_names, has_column, table_exists},
  tracking::require_audit_table,
};

const MIRROR_PREFIX: &str = "pk_";

/// The key-mirror columns of an audit table, in key order, with the
/// source column name they mirror.
fn mirror_columns(conn: &Connection, audit: &str) -> Result<Vec<(String, String)>> {
  Ok(
    column_names(conn, audit)?
      .into_iter()
      .filter_map(|c| {
        let source = c.strip_prefix(MIRROR_PREFIX)?.to_owned();
        Some((c, source))
      })
      .collect(),
  )
}

/// Every audit entry for `table`, newest first.
pub fn get_history(
  conn: &Connection,
  table: &str,
  limit: Option<usize>,
) -> Result<Vec<HistoryEntry>> {
  let audit = require_audit_table(conn, table)?;
  let mirrors = mirror_columns(conn, &audit)?;
  query_entries(conn, &audit, &mirrors, &[], limit)
}

/// Audit entries for the row identified by `key` (one value per key
/// column, in key order), newest first.
pub fn get_row_history(
  conn: &Connection,
  table: &str,
  key: &[Value],
  limit: Option<usize>,
) -> Result<Vec<HistoryEntry>> {
  let audit = require_audit_table(conn, table)?;
  let mirrors = mirror_columns(conn, &audit)?;
  let columns: Vec<&str> = mirrors.iter().map(|(_, source)| source.as_str()).collect();
  check_key_arity(table, &columns, key.len())?;
  query_entries(conn, &audit, &mirrors, key, limit)
}

pub(crate) fn check_key_arity(table: &str, columns: &[&str], given: usize) -> Result<()> {
  if columns.len() == given {
    return Ok(());
  }
  Err(Error::PrimaryKeyArity {
    table: table.to_owned(),
    expected: columns.len(),
    columns: columns.join(", "),
    given,
  })
}

fn query_entries(
  conn: &Connection,
  audit: &str,
  mirrors: &[(String, String)],
  key: &[Value],
  limit: Option<usize>,
) -> Result<Vec<HistoryEntry>> {
  let has_group = has_column(conn, audit, GROUP_COLUMN)?;
  let has_groups_table = table_exists(conn, GROUPS_TABLE)?;

  let (group_cols, join) = match (has_group, has_groups_table) {
    (true, true) => (
      format!("a.{}, g.note", quote_ident(GROUP_COLUMN)),
      format!(
        " LEFT JOIN {} AS g ON g.id = a.{}",
        quote_ident(GROUPS_TABLE),
        quote_ident(GROUP_COLUMN)
      ),
    ),
    (true, false) => (format!("a.{}, NULL", quote_ident(GROUP_COLUMN)), String::new()),
    (false, _) => ("NULL, NULL".to_owned(), String::new()),
  };

  let mirror_select: String = mirrors
    .iter()
    .map(|(c, _)| format!(", a.{}", quote_ident(c)))
    .collect();

  let filter = if key.is_empty() {
    String::new()
  } else {
    let conditions: Vec<String> = mirrors
      .iter()
      .enumerate()
      .map(|(i, (c, _))| format!("a.{} = ?{}", quote_ident(c), i + 1))
      .collect();
    format!(" WHERE {}", conditions.join(" AND "))
  };

  let limit = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();

  let sql = format!(
    "SELECT a.id, a.timestamp, a.operation, a.updated_values, {group_cols}{mirror_select} FROM \
     {} AS a{join}{filter} ORDER BY a.id DESC{limit}",
    quote_ident(audit)
  );

  let params = key.iter().map(decode_value).collect::<Result<Vec<_>>>()?;
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query(params_from_iter(params))?;

  let mut entries = Vec::new();
  while let Some(row) = rows.next()? {
    let operation: String = row.get(2)?;
    let operation = operation
      .parse::<Operation>()
      .map_err(|_| Error::UnknownOperation(operation.clone()))?;

    let updated_values = row
      .get::<_, Option<String>>(3)?
      .map(|text| serde_json::from_str::<Value>(&text))
      .transpose()?;

    let mut primary_key = Map::new();
    for (i, (_, source)) in mirrors.iter().enumerate() {
      primary_key.insert(source.clone(), sql_to_json(row.get_ref(6 + i)?));
    }

    entries.push(HistoryEntry {
      id: row.get(0)?,
      timestamp: row.get(1)?,
      operation,
      primary_key,
      updated_values,
      group: row.get(4)?,
      group_note: row.get(5)?,
    });
  }
  Ok(entries)
}

