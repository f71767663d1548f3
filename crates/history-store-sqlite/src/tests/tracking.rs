use rusqlite::types::Value as SqlValue;
use serde_json::json;

use super::{audit, count, db, items, rows, user_roles};
use crate::{
  Error, TriggerRevision, disable_tracking, enable_tracking, populate, tracking_revision,
};

fn trigger_count(conn: &rusqlite::Connection, table: &str) -> i64 {
  conn
    .query_row(
      "SELECT count(*) FROM sqlite_master WHERE type = 'trigger' AND tbl_name = ?1",
      [table],
      |row| row.get(0),
    )
    .unwrap()
}

// ─── Enable / disable ────────────────────────────────────────────────────────

#[test]
fn enable_creates_audit_table_and_triggers() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();

  assert_eq!(
    count(
      &conn,
      "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = '_history_json_items'"
    ),
    1
  );
  assert_eq!(trigger_count(&conn, "items"), 3);
  assert_eq!(tracking_revision(&conn, "items").unwrap(), TriggerRevision::Versioned(2));
}

#[test]
fn enable_is_idempotent() {
  let conn = items();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  enable_tracking(&conn, "items", true).unwrap();
  enable_tracking(&conn, "items", true).unwrap();

  assert_eq!(trigger_count(&conn, "items"), 3);
  assert_eq!(audit(&conn, "items").len(), 1);
}

#[test]
fn enable_requires_an_explicit_primary_key() {
  let conn = db("CREATE TABLE loose (a TEXT, b TEXT)");
  let err = enable_tracking(&conn, "loose", true).unwrap_err();
  assert!(matches!(err, Error::MissingPrimaryKey(ref t) if t == "loose"), "{err}");
  assert!(err.to_string().contains("explicit PRIMARY KEY"));
}

#[test]
fn enable_on_missing_table_fails() {
  let conn = items();
  assert!(matches!(
    enable_tracking(&conn, "nope", true),
    Err(Error::TableNotFound(_))
  ));
}

#[test]
fn enable_rolls_back_with_the_callers_transaction() {
  let conn = items();
  conn.execute_batch("BEGIN").unwrap();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute_batch("ROLLBACK").unwrap();

  assert_eq!(trigger_count(&conn, "items"), 0);
  assert_eq!(
    count(&conn, "SELECT count(*) FROM sqlite_master WHERE name LIKE '_history_json%'"),
    0
  );
}

#[test]
fn disable_keeps_the_log_and_stops_recording() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();

  disable_tracking(&conn, "items").unwrap();
  assert_eq!(trigger_count(&conn, "items"), 0);
  assert_eq!(tracking_revision(&conn, "items").unwrap(), TriggerRevision::Untracked);

  conn.execute("INSERT INTO items VALUES (2, 'Gadget', 1.0, 1)", []).unwrap();
  assert_eq!(audit(&conn, "items").len(), 1);
}

#[test]
fn disable_when_not_tracked_is_a_no_op() {
  let conn = items();
  disable_tracking(&conn, "items").unwrap();
  disable_tracking(&conn, "items").unwrap();
  disable_tracking(&conn, "missing").unwrap();
}

// ─── Populate ────────────────────────────────────────────────────────────────

#[test]
fn enable_snapshots_existing_rows() {
  let conn = items();
  conn
    .execute_batch(
      "INSERT INTO items VALUES (2, 'Gadget', 5.0, NULL);
       INSERT INTO items VALUES (1, 'Widget', 9.99, 100);",
    )
    .unwrap();
  enable_tracking(&conn, "items", true).unwrap();

  let log = audit(&conn, "items");
  assert_eq!(log.len(), 2);
  assert!(log.iter().all(|(_, op, _)| op == "insert"));
  assert_eq!(
    log[0].2,
    Some(json!({ "name": "Widget", "price": 9.99, "quantity": 100 }))
  );
  assert_eq!(
    log[1].2,
    Some(json!({ "name": "Gadget", "price": 5.0, "quantity": { "null": 1 } }))
  );
}

#[test]
fn enable_without_populate_leaves_the_log_empty() {
  let conn = items();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  enable_tracking(&conn, "items", false).unwrap();
  assert!(audit(&conn, "items").is_empty());
}

#[test]
fn populate_twice_duplicates_entries() {
  let conn = items();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  enable_tracking(&conn, "items", false).unwrap();
  assert_eq!(populate(&conn, "items").unwrap(), 1);
  assert_eq!(populate(&conn, "items").unwrap(), 1);
  assert_eq!(audit(&conn, "items").len(), 2);
}

// ─── Captured values ─────────────────────────────────────────────────────────

#[test]
fn insert_records_every_non_key_column() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();

  let log = audit(&conn, "items");
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].1, "insert");
  assert_eq!(
    log[0].2,
    Some(json!({ "name": "Widget", "price": 9.99, "quantity": 100 }))
  );
  assert_eq!(
    count(&conn, "SELECT pk_id FROM _history_json_items WHERE id = 1"),
    1
  );
}

#[test]
fn nulls_use_the_null_marker() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items (id, name) VALUES (1, 'Widget')", []).unwrap();

  let log = audit(&conn, "items");
  assert_eq!(
    log[0].2,
    Some(json!({ "name": "Widget", "price": { "null": 1 }, "quantity": { "null": 1 } }))
  );
}

#[test]
fn blobs_use_uppercase_hex() {
  let conn = db("CREATE TABLE files (id INTEGER PRIMARY KEY, data BLOB, name TEXT)");
  enable_tracking(&conn, "files", true).unwrap();
  conn
    .execute("INSERT INTO files VALUES (1, x'00deadbeef', 'a.bin')", [])
    .unwrap();
  conn
    .execute("UPDATE files SET data = x'CAFE' WHERE id = 1", [])
    .unwrap();

  let log = audit(&conn, "files");
  assert_eq!(log[0].2, Some(json!({ "data": { "hex": "00DEADBEEF" }, "name": "a.bin" })));
  assert_eq!(log[1].2, Some(json!({ "data": { "hex": "CAFE" } })));
}

#[test]
fn update_records_only_changed_columns() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  conn
    .execute("UPDATE items SET price = 19.99, name = 'Widget' WHERE id = 1", [])
    .unwrap();

  let log = audit(&conn, "items");
  assert_eq!(log[1].1, "update");
  assert_eq!(log[1].2, Some(json!({ "price": 19.99 })));
}

#[test]
fn no_op_updates_are_not_recorded() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', NULL, 100)", []).unwrap();
  conn
    .execute(
      "UPDATE items SET name = 'Widget', price = NULL, quantity = 100 WHERE id = 1",
      [],
    )
    .unwrap();
  conn.execute("UPDATE items SET name = name", []).unwrap();

  assert_eq!(audit(&conn, "items").len(), 1);
}

#[test]
fn updates_to_and_from_null() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  conn.execute("UPDATE items SET price = NULL WHERE id = 1", []).unwrap();
  conn.execute("UPDATE items SET price = 5.99 WHERE id = 1", []).unwrap();

  let log = audit(&conn, "items");
  assert_eq!(log[1].2, Some(json!({ "price": { "null": 1 } })));
  assert_eq!(log[2].2, Some(json!({ "price": 5.99 })));
}

#[test]
fn key_only_tables_record_inserts_and_deletes() {
  let conn = db("CREATE TABLE tags (name TEXT PRIMARY KEY)");
  enable_tracking(&conn, "tags", true).unwrap();
  conn.execute("INSERT INTO tags VALUES ('red')", []).unwrap();
  conn.execute("UPDATE tags SET name = name", []).unwrap();
  conn.execute("DELETE FROM tags", []).unwrap();

  let log = audit(&conn, "tags");
  assert_eq!(log.len(), 2);
  assert_eq!(log[0].2, Some(json!({})));
  assert_eq!(log[1].1, "delete");
}

#[test]
fn delete_records_the_old_key_and_no_values() {
  let conn = user_roles();
  enable_tracking(&conn, "user_roles", true).unwrap();
  conn
    .execute("INSERT INTO user_roles VALUES (1, 2, 'admin', 1)", [])
    .unwrap();
  conn
    .execute("DELETE FROM user_roles WHERE user_id = 1 AND role_id = 2", [])
    .unwrap();

  let log = audit(&conn, "user_roles");
  assert_eq!(log[1].1, "delete");
  assert_eq!(log[1].2, None);
  let keys: (i64, i64) = conn
    .query_row(
      "SELECT pk_user_id, pk_role_id FROM _history_json_user_roles WHERE id = 2",
      [],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap();
  assert_eq!(keys, (1, 2));
}

#[test]
fn writes_roll_back_with_their_audit_rows() {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn.execute_batch("BEGIN").unwrap();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  conn.execute_batch("ROLLBACK").unwrap();

  assert!(audit(&conn, "items").is_empty());
}

#[test]
fn awkward_identifiers_are_quoted_end_to_end() {
  let conn = db("CREATE TABLE \"my table\" (\"the id\" INTEGER PRIMARY KEY, \"it's\" TEXT)");
  enable_tracking(&conn, "my table", true).unwrap();
  conn
    .execute("INSERT INTO \"my table\" VALUES (1, 'x')", [])
    .unwrap();
  conn
    .execute("UPDATE \"my table\" SET \"it's\" = 'y'", [])
    .unwrap();

  let log = audit(&conn, "my table");
  assert_eq!(log[0].2, Some(json!({ "it's": "x" })));
  assert_eq!(log[1].2, Some(json!({ "it's": "y" })));
  assert_eq!(rows(&conn, "my table"), vec![vec![SqlValue::Integer(1), super::text("y")]]);
}
