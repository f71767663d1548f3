//! Restore parameters and timestamp-bound handling.
//!
//! Audit timestamps are stored as `YYYY-MM-DD HH:MM:SS.fff` text and filtered
//! with plain string comparison, so every caller-supplied bound is normalised
//! to exactly that shape first.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::{Error, Result};

/// `strftime` shape the triggers write, expressed for chrono.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const ACCEPTED_FORMATS: [&str; 4] = [
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%dT%H:%M",
];

/// Where the replayed table ends up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestoreTarget {
  /// A new table named `<table>_restored`.
  #[default]
  Default,
  /// A new table with an explicit name.
  Named(String),
  /// Replace the tracked table in place, atomically.
  Swap,
}

/// Parameters for a restore. Both bounds are inclusive and combine with AND;
/// a missing bound is unbounded.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
  pub timestamp: Option<NaiveDateTime>,
  pub up_to_id:  Option<i64>,
  pub target:    RestoreTarget,
}

impl RestoreOptions {
  pub fn up_to_id(id: i64) -> Self {
    Self { up_to_id: Some(id), ..Self::default() }
  }

  pub fn with_target(mut self, target: RestoreTarget) -> Self {
    self.target = target;
    self
  }

  /// The timestamp bound rendered in the stored text shape.
  pub fn timestamp_bound(&self) -> Option<String> {
    self.timestamp.map(format_timestamp)
  }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
  ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a caller-supplied timestamp bound.
///
/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DD HH:MM[:SS[.fff]]`, the same
/// with a `T` separator, and RFC 3339 with an offset (converted to UTC).
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
  let s = input.trim();

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.naive_utc());
  }

  for fmt in ACCEPTED_FORMATS {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Ok(dt);
    }
  }

  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .ok_or_else(|| Error::InvalidTimestamp(input.to_owned()))
}
