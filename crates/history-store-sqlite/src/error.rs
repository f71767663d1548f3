//! Error type for `history-store-sqlite`.

use history_core::Classify;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] history_core::Error),

  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("connection error: {0}")]
  Connection(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("hex decode error: {0}")]
  Hex(#[from] hex::FromHexError),

  #[error("table {0:?} does not exist")]
  TableNotFound(String),

  /// History needs a stable row identity to correlate operations.
  #[error(
    "table {0:?} has no explicit primary key; history tracking requires an explicit PRIMARY KEY"
  )]
  MissingPrimaryKey(String),

  #[error(
    "table {table:?} has {expected} primary key column(s) ({columns}), but {given} value(s) provided"
  )]
  PrimaryKeyArity {
    table:    String,
    expected: usize,
    columns:  String,
    given:    usize,
  },

  #[error("row ({key}) not found in table {table:?}")]
  RowNotFound { table: String, key: String },

  #[error("history tracking is not enabled for table {0:?}")]
  NotTracked(String),

  #[error("unrecognised operation {0:?} in audit table")]
  UnknownOperation(String),

  #[error("cannot read the CREATE TABLE statement for {0:?}")]
  UnreadableSchema(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn is_validation(&self) -> bool {
    match self {
      Error::Core(e) => e.is_validation(),
      Error::TableNotFound(_)
      | Error::MissingPrimaryKey(_)
      | Error::PrimaryKeyArity { .. }
      | Error::RowNotFound { .. }
      | Error::NotTracked(_) => true,
      _ => false,
    }
  }
}
