//! The audit-log value convention.
//!
//! SQL NULL is stored as `{"null": 1}` and BLOBs as `{"hex": "<UPPERCASE>"}`;
//! every other value is stored as its natural JSON form. The triggers do the
//! encoding in SQL; this module does the decoding for replay.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value, json};

use crate::Result;

/// Decode one audit-log JSON value into a SQL value.
pub fn decode_value(value: &Value) -> Result<SqlValue> {
  if let Value::Object(map) = value {
    if map.contains_key("null") {
      return Ok(SqlValue::Null);
    }
    if let Some(Value::String(hex)) = map.get("hex") {
      return Ok(SqlValue::Blob(hex::decode(hex)?));
    }
  }
  Ok(json_to_sql(value))
}

/// Map a plain JSON value onto SQLite storage classes, without the
/// null/hex convention. Arrays and objects are stored as JSON text.
pub fn json_to_sql(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    other => SqlValue::Text(other.to_string()),
  }
}

/// Render a stored value as JSON. BLOBs use the hex convention; NULL is
/// plain JSON `null`.
pub fn sql_to_json(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::Number(i.into()),
    ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => json!({ "hex": hex::encode_upper(b) }),
  }
}

/// Parse the `updated_values` text of an audit row. Anything other than a
/// JSON object (including SQL NULL) yields `None`.
pub fn parse_updated_values(text: Option<&str>) -> Result<Option<Map<String, Value>>> {
  let Some(text) = text else { return Ok(None) };
  match serde_json::from_str(text)? {
    Value::Object(map) => Ok(Some(map)),
    _ => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn null_marker_decodes_to_sql_null() {
    assert_eq!(decode_value(&json!({ "null": 1 })).unwrap(), SqlValue::Null);
    assert_eq!(decode_value(&Value::Null).unwrap(), SqlValue::Null);
  }

  #[test]
  fn hex_marker_decodes_to_exact_bytes() {
    let bytes = vec![0x00, 0xde, 0xad, 0xbe, 0xef, 0xff];
    let encoded = sql_to_json(ValueRef::Blob(&bytes));
    assert_eq!(encoded, json!({ "hex": "00DEADBEEFFF" }));
    assert_eq!(decode_value(&encoded).unwrap(), SqlValue::Blob(bytes));
  }

  #[test]
  fn bad_hex_is_an_error() {
    assert!(decode_value(&json!({ "hex": "XYZ" })).is_err());
  }

  #[test]
  fn scalars_pass_through() {
    assert_eq!(decode_value(&json!(42)).unwrap(), SqlValue::Integer(42));
    assert_eq!(decode_value(&json!(9.99)).unwrap(), SqlValue::Real(9.99));
    assert_eq!(decode_value(&json!("Widget")).unwrap(), SqlValue::Text("Widget".into()));
    assert_eq!(decode_value(&json!(true)).unwrap(), SqlValue::Integer(1));
  }

  #[test]
  fn other_objects_become_json_text() {
    assert_eq!(
      decode_value(&json!({ "a": [1, 2] })).unwrap(),
      SqlValue::Text(r#"{"a":[1,2]}"#.into())
    );
  }

  #[test]
  fn updated_values_parse_to_objects_only() {
    assert!(parse_updated_values(None).unwrap().is_none());
    assert!(parse_updated_values(Some("null")).unwrap().is_none());
    let map = parse_updated_values(Some(r#"{"price":19.99}"#)).unwrap().unwrap();
    assert_eq!(map["price"], json!(19.99));
  }
}
