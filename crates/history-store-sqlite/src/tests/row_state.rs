use serde_json::{Value, json};

use super::{db, items, user_roles};
use crate::{Error, enable_tracking, row_state, row_state_query};

fn tracked_items() -> rusqlite::Connection {
  let conn = items();
  enable_tracking(&conn, "items", true).unwrap();
  conn
}

fn state(conn: &rusqlite::Connection, id: i64, target: i64) -> Option<Value> {
  row_state(conn, "items", &[json!(id)], target).unwrap()
}

#[test]
fn query_names_its_parameters() {
  let conn = tracked_items();
  let sql = row_state_query(&conn, "items").unwrap();
  assert!(sql.contains(":pk"));
  assert!(sql.contains(":target_id"));
  assert!(!sql.contains(":pk_1"));

  let conn = user_roles();
  enable_tracking(&conn, "user_roles", true).unwrap();
  let sql = row_state_query(&conn, "user_roles").unwrap();
  assert!(sql.contains(":pk_1") && sql.contains(":pk_2"));
}

#[test]
fn query_runs_as_plain_sql() {
  let conn = tracked_items();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  let sql = row_state_query(&conn, "items").unwrap();

  let text: String = conn
    .query_row(
      &sql,
      rusqlite::named_params! { ":pk": 1, ":target_id": 1 },
      |row| row.get(0),
    )
    .unwrap();
  let value: Value = serde_json::from_str(&text).unwrap();
  assert_eq!(value, json!({ "name": "Widget", "price": 9.99, "quantity": 100 }));
}

#[test]
fn folds_updates_up_to_the_target() {
  let conn = tracked_items();
  conn
    .execute_batch(
      "INSERT INTO items VALUES (1, 'Widget', 9.99, 100);
       UPDATE items SET name = 'A' WHERE id = 1;
       UPDATE items SET price = 1.99 WHERE id = 1;
       UPDATE items SET quantity = 5 WHERE id = 1;",
    )
    .unwrap();

  assert_eq!(
    state(&conn, 1, 4),
    Some(json!({ "name": "A", "price": 1.99, "quantity": 5 }))
  );
  assert_eq!(state(&conn, 1, 2).unwrap()["name"], json!("A"));
  assert_eq!(state(&conn, 1, 1).unwrap()["name"], json!("Widget"));
}

#[test]
fn delete_collapses_to_null_and_reinsert_starts_over() {
  let conn = tracked_items();
  conn
    .execute_batch(
      "INSERT INTO items VALUES (1, 'Widget', 9.99, 100);
       DELETE FROM items WHERE id = 1;
       INSERT INTO items VALUES (1, 'New Widget', 5.99, 50);",
    )
    .unwrap();

  assert_eq!(state(&conn, 1, 2), Some(Value::Null));
  assert_eq!(
    state(&conn, 1, 3),
    Some(json!({ "name": "New Widget", "price": 5.99, "quantity": 50 }))
  );
}

#[test]
fn null_markers_are_replaced_not_merged() {
  let conn = db("CREATE TABLE files (id INTEGER PRIMARY KEY, data BLOB, name TEXT)");
  enable_tracking(&conn, "files", true).unwrap();
  conn
    .execute_batch(
      "INSERT INTO files (id, name) VALUES (1, 'a');
       UPDATE files SET data = x'ABCD' WHERE id = 1;
       UPDATE files SET name = NULL WHERE id = 1;",
    )
    .unwrap();

  let value = row_state(&conn, "files", &[json!(1)], 3).unwrap();
  assert_eq!(
    value,
    Some(json!({ "data": { "hex": "ABCD" }, "name": { "null": 1 } }))
  );
}

#[test]
fn updates_from_null() {
  let conn = tracked_items();
  conn
    .execute_batch(
      "INSERT INTO items (id, name) VALUES (1, 'Widget');
       UPDATE items SET price = 5.99 WHERE id = 1;",
    )
    .unwrap();

  assert_eq!(state(&conn, 1, 1).unwrap()["price"], json!({ "null": 1 }));
  assert_eq!(state(&conn, 1, 2).unwrap()["price"], json!(5.99));
}

#[test]
fn unknown_rows_have_no_state() {
  let conn = tracked_items();
  conn.execute("INSERT INTO items VALUES (1, 'Widget', 9.99, 100)", []).unwrap();
  assert_eq!(state(&conn, 999, 1), None);
  // Inserted after the target.
  conn.execute("INSERT INTO items VALUES (2, 'Later', 1.0, 1)", []).unwrap();
  assert_eq!(state(&conn, 2, 1), None);
}

#[test]
fn compound_keys_select_one_row() {
  let conn = user_roles();
  enable_tracking(&conn, "user_roles", true).unwrap();
  conn
    .execute_batch(
      "INSERT INTO user_roles VALUES (1, 2, 'admin', 1);
       INSERT INTO user_roles VALUES (1, 3, 'system', 1);
       UPDATE user_roles SET active = 0 WHERE role_id = 3;",
    )
    .unwrap();

  let value = row_state(&conn, "user_roles", &[json!(1), json!(2)], 3).unwrap();
  assert_eq!(value, Some(json!({ "granted_by": "admin", "active": 1 })));
  let value = row_state(&conn, "user_roles", &[json!(1), json!(3)], 3).unwrap();
  assert_eq!(value, Some(json!({ "granted_by": "system", "active": 0 })));
}

#[test]
fn requires_tracking_and_a_table() {
  let conn = items();
  let err = row_state_query(&conn, "items").unwrap_err();
  assert!(matches!(err, Error::NotTracked(_)));
  assert!(err.to_string().contains("not enabled"));
  assert!(matches!(
    row_state_query(&conn, "nonexistent"),
    Err(Error::TableNotFound(_))
  ));
}

#[test]
fn key_arity_is_checked() {
  let conn = tracked_items();
  assert!(matches!(
    row_state(&conn, "items", &[json!(1), json!(2)], 1),
    Err(Error::PrimaryKeyArity { expected: 1, given: 2, .. })
  ));
}
