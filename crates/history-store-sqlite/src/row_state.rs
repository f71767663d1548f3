//! A single recursive query that folds one row's audit entries into its
//! JSON state at a given entry id.
//!
//! Parameters: `:pk` for a single-column key (`:pk_1`, `:pk_2`, ... for a
//! compound key, in key order) and `:target_id`. The query returns one
//! row whose value is the state object, or NULL if the row was deleted by
//! then; it returns no row if the key had no insert at or before the target.

use rusqlite::{Connection, OptionalExtension as _, ToSql, types::Value as SqlValue};
use serde_json::Value;

use crate::{
  Result,
  encode::decode_value,
  history::check_key_arity,
  names::{audit_pk_column, quote_ident},
  schema::TableSchema,
  tracking::require_audit_table,
};

/// Parameter names for the key columns, in key order.
fn key_params(count: usize) -> Vec<String> {
  if count == 1 {
    vec![":pk".to_owned()]
  } else {
    (1..=count).map(|i| format!(":pk_{i}")).collect()
  }
}

/// Generate the row-state query for `table`.
pub fn row_state_query(conn: &Connection, table: &str) -> Result<String> {
  let schema = TableSchema::read(conn, table)?;
  let audit = quote_ident(&require_audit_table(conn, table)?);

  let pk = schema.pk_columns();
  let params = key_params(pk.len());
  let key_match = pk
    .iter()
    .zip(&params)
    .map(|(c, p)| format!("{} = {p}", quote_ident(&audit_pk_column(&c.name))))
    .collect::<Vec<_>>()
    .join(" AND ");

  // Each step clears the keys it is about to set before patching, so a
  // marker object such as {"null": 1} is replaced rather than merged.
  Ok(format!(
    "WITH entries AS (
    SELECT
        a.id,
        a.operation,
        a.updated_values,
        row_number() OVER (ORDER BY a.id) AS seq,
        (SELECT json_group_object(key, json('null')) FROM json_each(a.updated_values)) AS clears
    FROM {audit} AS a
    WHERE {key_match}
      AND a.id <= :target_id
      AND a.id >= (
          SELECT max(id) FROM {audit}
          WHERE {key_match} AND operation = 'insert' AND id <= :target_id
      )
),
folded(seq, state) AS (
    SELECT seq, updated_values FROM entries WHERE seq = 1
    UNION ALL
    SELECT
        e.seq,
        CASE e.operation
            WHEN 'delete' THEN NULL
            WHEN 'insert' THEN e.updated_values
            ELSE json_patch(json_patch(f.state, e.clears), e.updated_values)
        END
    FROM folded AS f
    JOIN entries AS e ON e.seq = f.seq + 1
)
SELECT state FROM folded ORDER BY seq DESC LIMIT 1"
  ))
}

/// Evaluate the row-state query for one key. `None` means the row had no
/// insert at or before `target_id`; `Some(Value::Null)` means it was
/// deleted.
pub fn row_state(
  conn: &Connection,
  table: &str,
  key: &[Value],
  target_id: i64,
) -> Result<Option<Value>> {
  let sql = row_state_query(conn, table)?;

  let schema = TableSchema::read(conn, table)?;
  let pk = schema.pk_columns();
  let columns: Vec<&str> = pk.iter().map(|c| c.name.as_str()).collect();
  check_key_arity(table, &columns, key.len())?;

  let mut bound: Vec<(String, SqlValue)> = key_params(key.len())
    .into_iter()
    .zip(key.iter().map(decode_value).collect::<Result<Vec<_>>>()?)
    .collect();
  bound.push((":target_id".to_owned(), SqlValue::Integer(target_id)));
  let params: Vec<(&str, &dyn ToSql)> =
    bound.iter().map(|(name, value)| (name.as_str(), value as &dyn ToSql)).collect();

  let state = conn
    .query_row(&sql, params.as_slice(), |row| row.get::<_, Option<String>>(0))
    .optional()?;

  match state {
    None => Ok(None),
    Some(None) => Ok(Some(Value::Null)),
    Some(Some(text)) => Ok(Some(serde_json::from_str(&text)?)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_keys_use_a_bare_parameter() {
    assert_eq!(key_params(1), vec![":pk"]);
    assert_eq!(key_params(3), vec![":pk_1", ":pk_2", ":pk_3"]);
  }
}
