//! Primary-key values supplied as text (CLI arguments, URL segments).

use serde_json::{Number, Value};

/// Coerce a textual key value: integer first, then float, otherwise text.
///
/// SQLite applies column affinity when comparing, so a coerced value still
/// matches a `TEXT` key column that happens to hold digits.
pub fn coerce_key_value(s: &str) -> Value {
  if let Ok(i) = s.parse::<i64>() {
    return Value::Number(i.into());
  }
  if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
    return Value::Number(n);
  }
  Value::String(s.to_owned())
}

/// Split a comma-separated compound key segment and coerce each part.
pub fn parse_key_segment(segment: &str) -> Vec<Value> {
  segment.split(',').map(coerce_key_value).collect()
}
