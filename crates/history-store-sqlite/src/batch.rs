//! Executing batch writes under one transaction and one change group.

use history_core::batch::{BatchAction, BatchOperation, BatchOutcome, SubResult};
use rusqlite::{Connection, TransactionBehavior, params_from_iter, types::Value as SqlValue};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  encode::json_to_sql,
  group::change_group,
  history::check_key_arity,
  names::quote_ident,
  schema::TableSchema,
  tracking::atomically,
};

const MISSING_ROWS: &str = "Missing 'row' or 'rows'";
const MISSING_UPDATE: &str = "Missing 'update'";

/// Run `operations` in one write transaction with one change group
/// carrying `note`. Each operation runs in its own savepoint: a failure is
/// reported in its result and the rest still run.
///
/// An empty batch creates no group.
pub fn run_batch(
  conn: &mut Connection,
  note: Option<&str>,
  operations: &[BatchOperation],
) -> Result<BatchOutcome> {
  if operations.is_empty() {
    return Ok(BatchOutcome { group_id: None, results: Vec::new() });
  }

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let outcome = change_group(&tx, note, |group_id| -> Result<_> {
    let results = operations
      .iter()
      .map(|op| match atomically(&tx, |conn| execute(conn, op)) {
        Ok(()) => SubResult::ok(op.action.success_status()),
        Err(e) => {
          tracing::debug!(table = %op.table, error = %e, "batch operation failed");
          SubResult::failed(e.to_string())
        }
      })
      .collect();
    Ok(BatchOutcome { group_id: Some(group_id), results })
  })?;
  tx.commit()?;

  tracing::info!(
    group = ?outcome.group_id,
    operations = operations.len(),
    "applied batch"
  );
  Ok(outcome)
}

fn execute(conn: &Connection, op: &BatchOperation) -> Result<()> {
  match op.action {
    BatchAction::Insert => {
      let verb = if flag(&op.body, "replace") {
        "INSERT OR REPLACE"
      } else if flag(&op.body, "ignore") {
        "INSERT OR IGNORE"
      } else {
        "INSERT"
      };
      for row in body_rows(&op.body)? {
        insert_row(conn, verb, &op.table, row, None)?;
      }
    }
    BatchAction::Upsert => {
      let schema = TableSchema::read(conn, &op.table)?;
      for row in body_rows(&op.body)? {
        insert_row(conn, "INSERT", &op.table, row, Some(&schema))?;
      }
    }
    BatchAction::Update => {
      let updates = op
        .body
        .get("update")
        .and_then(Value::as_object)
        .filter(|u| !u.is_empty())
        .ok_or(history_core::Error::InvalidBody(MISSING_UPDATE))?;
      update_row(conn, op, updates)?;
    }
    BatchAction::Delete => {
      let schema = TableSchema::read(conn, &op.table)?;
      let (filter, params) = key_filter(&schema, &op.key, 1)?;
      let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE {filter}", quote_ident(&op.table)),
        params_from_iter(params),
      )?;
      if deleted == 0 {
        return Err(row_not_found(op));
      }
    }
  }
  Ok(())
}

fn flag(body: &Value, name: &str) -> bool {
  body.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// `{"row": {...}}` or `{"rows": [{...}, ...]}`.
fn body_rows(body: &Value) -> Result<Vec<&Map<String, Value>>> {
  let missing = || Error::from(history_core::Error::InvalidBody(MISSING_ROWS));
  if let Some(row) = body.get("row") {
    return Ok(vec![row.as_object().ok_or_else(missing)?]);
  }
  body
    .get("rows")
    .and_then(Value::as_array)
    .ok_or_else(missing)?
    .iter()
    .map(|row| row.as_object().ok_or_else(missing))
    .collect()
}

/// Insert one row. With `upsert_schema`, a key conflict updates the columns
/// the row supplies instead of failing.
fn insert_row(
  conn: &Connection,
  verb: &str,
  table: &str,
  row: &Map<String, Value>,
  upsert_schema: Option<&TableSchema>,
) -> Result<()> {
  let table = quote_ident(table);
  if row.is_empty() {
    conn.execute(&format!("{verb} INTO {table} DEFAULT VALUES"), [])?;
    return Ok(());
  }

  let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
  let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
  let mut sql = format!(
    "{verb} INTO {table} ({}) VALUES ({})",
    columns.join(", "),
    placeholders.join(", ")
  );

  if let Some(schema) = upsert_schema {
    let pk: Vec<String> = schema.pk_columns().iter().map(|c| quote_ident(&c.name)).collect();
    let sets: Vec<String> = schema
      .non_pk_columns()
      .into_iter()
      .filter(|c| row.contains_key(&c.name))
      .map(|c| {
        let name = quote_ident(&c.name);
        format!("{name} = excluded.{name}")
      })
      .collect();
    sql.push_str(&format!(" ON CONFLICT ({}) DO ", pk.join(", ")));
    if sets.is_empty() {
      sql.push_str("NOTHING");
    } else {
      sql.push_str(&format!("UPDATE SET {}", sets.join(", ")));
    }
  }

  conn.execute(&sql, params_from_iter(row.values().map(json_to_sql)))?;
  Ok(())
}

fn update_row(conn: &Connection, op: &BatchOperation, updates: &Map<String, Value>) -> Result<()> {
  let schema = TableSchema::read(conn, &op.table)?;
  let sets: Vec<String> = updates
    .keys()
    .enumerate()
    .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 1))
    .collect();
  let (filter, key) = key_filter(&schema, &op.key, updates.len() + 1)?;

  let mut params: Vec<SqlValue> = updates.values().map(json_to_sql).collect();
  params.extend(key);

  let updated = conn.execute(
    &format!(
      "UPDATE {} SET {} WHERE {filter}",
      quote_ident(&op.table),
      sets.join(", ")
    ),
    params_from_iter(params),
  )?;
  if updated == 0 {
    return Err(row_not_found(op));
  }
  Ok(())
}

/// Key equality over the table's primary key, with parameters numbered
/// from `first`.
fn key_filter(
  schema: &TableSchema,
  key: &[Value],
  first: usize,
) -> Result<(String, Vec<SqlValue>)> {
  let pk = schema.pk_columns();
  let names: Vec<&str> = pk.iter().map(|c| c.name.as_str()).collect();
  check_key_arity(&schema.name, &names, key.len())?;

  let filter = names
    .iter()
    .enumerate()
    .map(|(i, name)| format!("{} = ?{}", quote_ident(name), first + i))
    .collect::<Vec<_>>()
    .join(" AND ");
  Ok((filter, key.iter().map(json_to_sql).collect()))
}

fn row_not_found(op: &BatchOperation) -> Error {
  Error::RowNotFound {
    table: op.table.clone(),
    key:   op.key.iter().map(Value::to_string).collect::<Vec<_>>().join(", "),
  }
}
