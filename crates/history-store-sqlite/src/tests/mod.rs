//! Integration tests for the SQLite engine against in-memory databases.

use rusqlite::{Connection, types::Value as SqlValue};
use serde_json::Value;

mod row_state;
mod tracking;

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn db(ddl: &str) -> Connection {
  let conn = Connection::open_in_memory().expect("in-memory db");
  conn.execute_batch(ddl).expect("fixture ddl");
  conn
}

fn items() -> Connection {
  db("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, quantity INTEGER)")
}

fn user_roles() -> Connection {
  db(
    "CREATE TABLE user_roles (
       user_id INTEGER,
       role_id INTEGER,
       granted_by TEXT,
       active INTEGER,
       PRIMARY KEY (user_id, role_id)
     )",
  )
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Every row of `table`, ordered by its first column then the second.
fn rows(conn: &Connection, table: &str) -> Vec<Vec<SqlValue>> {
  let mut stmt = conn
    .prepare(&format!("SELECT * FROM \"{table}\" ORDER BY 1, 2"))
    .unwrap();
  let width = stmt.column_count();
  stmt
    .query_map([], |row| {
      (0..width)
        .map(|i| row.get::<_, SqlValue>(i))
        .collect::<rusqlite::Result<Vec<_>>>()
    })
    .unwrap()
    .collect::<rusqlite::Result<Vec<_>>>()
    .unwrap()
}

/// `(id, operation, updated_values)` for every audit row, oldest first.
fn audit(conn: &Connection, table: &str) -> Vec<(i64, String, Option<Value>)> {
  let mut stmt = conn
    .prepare(&format!(
      "SELECT id, operation, updated_values FROM \"_history_json_{table}\" ORDER BY id"
    ))
    .unwrap();
  stmt
    .query_map([], |row| {
      let values: Option<String> = row.get(2)?;
      Ok((
        row.get(0)?,
        row.get(1)?,
        values.map(|v| serde_json::from_str(&v).unwrap()),
      ))
    })
    .unwrap()
    .collect::<rusqlite::Result<Vec<_>>>()
    .unwrap()
}

fn count(conn: &Connection, sql: &str) -> i64 {
  conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn text(s: &str) -> SqlValue { SqlValue::Text(s.to_owned()) }
