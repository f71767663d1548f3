//! Error types for `history-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid timestamp {0:?}: expected YYYY-MM-DD[ HH:MM[:SS[.fff]]] or RFC 3339")]
  InvalidTimestamp(String),

  #[error("cannot parse path: {0}")]
  InvalidPath(String),

  #[error("unknown operation: {0:?}")]
  UnknownOperation(String),

  /// A batch sub-request body lacks what its action needs.
  #[error("{0}")]
  InvalidBody(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of backend errors for callers that must decide how
/// to report them (exit codes, HTTP status).
pub trait Classify {
  /// `true` for caller mistakes: missing primary key, wrong key arity,
  /// tracking not enabled, unknown table. These are never retried.
  fn is_validation(&self) -> bool;
}

impl Classify for Error {
  fn is_validation(&self) -> bool { true }
}
