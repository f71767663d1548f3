//! Deterministic names for every object the tracker creates, and SQL quoting.

use history_core::entry::Operation;

/// Shared change-group table, one per database.
pub const GROUPS_TABLE: &str = "_history_json";

/// Unique partial index keeping at most one group current.
pub const GROUPS_CURRENT_INDEX: &str = "_history_json_current";

/// Audit-table column referencing the change group, if any.
pub const GROUP_COLUMN: &str = "group";

/// Prefix of every per-table audit log.
pub const AUDIT_PREFIX: &str = "_history_json_";

/// Revision of the generated trigger bodies. Bump when the encoding changes
/// so upgrade tooling can tell old triggers from current ones.
pub const TRIGGER_VERSION: u32 = 2;

/// Name prefix shared by all versioned triggers.
pub const TRIGGER_PREFIX: &str = "history_json_v";

pub fn audit_table_name(table: &str) -> String { format!("{AUDIT_PREFIX}{table}") }

/// Audit-table column mirroring a source primary-key column.
pub fn audit_pk_column(column: &str) -> String { format!("pk_{column}") }

pub fn trigger_name(op: Operation, table: &str) -> String {
  format!("{TRIGGER_PREFIX}{TRIGGER_VERSION}_{op}_{table}")
}

/// Names used before triggers carried a version tag.
pub fn legacy_trigger_name(op: Operation, table: &str) -> String {
  format!("{AUDIT_PREFIX}{table}_{op}")
}

pub fn timestamp_index_name(table: &str) -> String {
  format!("{}_timestamp", audit_table_name(table))
}

pub fn pk_index_name(table: &str) -> String { format!("{}_pk", audit_table_name(table)) }

/// Quote an identifier: `my "odd" table` becomes `"my ""odd"" table"`.
pub fn quote_ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

/// Quote a string literal: `it's` becomes `'it''s'`.
pub fn quote_literal(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

/// Parse a versioned trigger name into `(version, operation, table)`.
pub fn parse_trigger_name(name: &str) -> Option<(u32, Operation, &str)> {
  let rest = name.strip_prefix(TRIGGER_PREFIX)?;
  let (version, rest) = rest.split_once('_')?;
  let version = version.parse().ok()?;
  let (op, table) = rest.split_once('_')?;
  Some((version, op.parse().ok()?, table))
}
