//! SQL generation for audit tables, indexes, and triggers.
//!
//! Everything here is a pure function of a [`TableSchema`]; nothing touches
//! a connection. [`crate::tracking`] executes the output.

use history_core::entry::Operation;

use crate::{
  names::{
    GROUP_COLUMN, GROUPS_CURRENT_INDEX, GROUPS_TABLE, audit_pk_column, audit_table_name,
    pk_index_name, quote_ident, quote_literal, timestamp_index_name, trigger_name,
  },
  schema::{Column, TableSchema},
};

const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

// ─── Tables and indexes ──────────────────────────────────────────────────────

/// The shared change-group table and its single-current-row index.
pub fn groups_table_sql() -> String {
  let groups = quote_ident(GROUPS_TABLE);
  format!(
    "CREATE TABLE IF NOT EXISTS {groups} (\n    id INTEGER PRIMARY KEY,\n    note TEXT,\n    \
     current INTEGER\n);\nCREATE UNIQUE INDEX IF NOT EXISTS {} ON {groups} (current) WHERE current \
     = 1;",
    quote_ident(GROUPS_CURRENT_INDEX),
  )
}

/// Column definition for the group reference, shared by create and upgrade.
fn group_column_def() -> String {
  format!(
    "{} INTEGER REFERENCES {}(id)",
    quote_ident(GROUP_COLUMN),
    quote_ident(GROUPS_TABLE)
  )
}

pub fn audit_table_sql(schema: &TableSchema) -> String {
  let mut defs = vec![
    "id INTEGER PRIMARY KEY".to_owned(),
    "timestamp TEXT".to_owned(),
    "operation TEXT".to_owned(),
  ];
  for col in schema.pk_columns() {
    let name = quote_ident(&audit_pk_column(&col.name));
    defs.push(if col.decl_type.is_empty() {
      name
    } else {
      format!("{name} {}", col.decl_type)
    });
  }
  defs.push("updated_values TEXT".to_owned());
  defs.push(group_column_def());

  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
    quote_ident(&audit_table_name(&schema.name)),
    defs.join(",\n    ")
  )
}

/// Bring an audit table written before change groups existed up to date.
pub fn add_group_column_sql(audit_table: &str) -> String {
  format!(
    "ALTER TABLE {} ADD COLUMN {}",
    quote_ident(audit_table),
    group_column_def()
  )
}

pub fn index_sql(schema: &TableSchema) -> [String; 2] {
  let audit = quote_ident(&audit_table_name(&schema.name));
  [
    format!(
      "CREATE INDEX IF NOT EXISTS {} ON {audit} (timestamp)",
      quote_ident(&timestamp_index_name(&schema.name))
    ),
    format!(
      "CREATE INDEX IF NOT EXISTS {} ON {audit} ({})",
      quote_ident(&pk_index_name(&schema.name)),
      mirror_columns(schema)
    ),
  ]
}

// ─── Value expressions ───────────────────────────────────────────────────────

/// `"pk_a", "pk_b"`
fn mirror_columns(schema: &TableSchema) -> String {
  schema
    .pk_columns()
    .iter()
    .map(|c| quote_ident(&audit_pk_column(&c.name)))
    .collect::<Vec<_>>()
    .join(", ")
}

/// `NEW."a", NEW."b"`
fn key_refs(row: &str, schema: &TableSchema) -> String {
  schema
    .pk_columns()
    .iter()
    .map(|c| format!("{row}.{}", quote_ident(&c.name)))
    .collect::<Vec<_>>()
    .join(", ")
}

/// One column value under the null/hex convention.
fn encoded(row: &str, col: &Column) -> String {
  let v = format!("{row}.{}", quote_ident(&col.name));
  format!(
    "CASE WHEN {v} IS NULL THEN json_object('null', 1) WHEN typeof({v}) = 'blob' THEN \
     json_object('hex', hex({v})) ELSE {v} END"
  )
}

/// `json_object(...)` over every non-key column of `row`.
fn full_object(row: &str, schema: &TableSchema) -> String {
  let args: Vec<String> = schema
    .non_pk_columns()
    .into_iter()
    .map(|col| format!("{}, {}", quote_literal(&col.name), encoded(row, col)))
    .collect();
  format!("json_object({})", args.join(", "))
}

fn changed(col: &Column) -> String {
  let name = quote_ident(&col.name);
  format!("OLD.{name} IS NOT NEW.{name}")
}

/// Nested `json_patch` collecting only the columns whose value changed.
fn changed_object(schema: &TableSchema) -> String {
  schema.non_pk_columns().into_iter().fold("'{}'".to_owned(), |acc, col| {
    format!(
      "json_patch(\n            {acc},\n            CASE WHEN {} THEN json_object({}, {}) ELSE \
       '{{}}' END\n        )",
      changed(col),
      quote_literal(&col.name),
      encoded("NEW", col)
    )
  })
}

fn current_group() -> String {
  format!("(SELECT id FROM {} WHERE current = 1)", quote_ident(GROUPS_TABLE))
}

// ─── Triggers ────────────────────────────────────────────────────────────────

/// The `AFTER <op>` trigger for `schema`, named with the current version tag.
pub fn trigger_sql(op: Operation, schema: &TableSchema) -> String {
  let (row, when, values) = match op {
    Operation::Insert => ("NEW", String::new(), full_object("NEW", schema)),
    Operation::Update => {
      let conditions: Vec<String> = schema.non_pk_columns().into_iter().map(changed).collect();
      let when = if conditions.is_empty() {
        "\nWHEN 0".to_owned()
      } else {
        format!("\nWHEN {}", conditions.join(" OR "))
      };
      ("NEW", when, changed_object(schema))
    }
    Operation::Delete => ("OLD", String::new(), "NULL".to_owned()),
  };

  format!(
    "CREATE TRIGGER IF NOT EXISTS {name}\nAFTER {event} ON {table}{when}\nBEGIN\n    INSERT INTO \
     {audit} (timestamp, operation, {mirrors}, updated_values, {group_col})\n    VALUES (\n        \
     {NOW},\n        '{op}',\n        {keys},\n        {values},\n        {group}\n    );\nEND",
    name = quote_ident(&trigger_name(op, &schema.name)),
    event = op.as_str().to_uppercase(),
    table = quote_ident(&schema.name),
    audit = quote_ident(&audit_table_name(&schema.name)),
    mirrors = mirror_columns(schema),
    group_col = quote_ident(GROUP_COLUMN),
    keys = key_refs(row, schema),
    group = current_group(),
  )
}

pub fn drop_trigger_sql(name: &str) -> String {
  format!("DROP TRIGGER IF EXISTS {}", quote_ident(name))
}

/// Snapshot every current row as an `insert` entry, encoded exactly as the
/// insert trigger would encode it.
pub fn populate_sql(schema: &TableSchema) -> String {
  format!(
    "INSERT INTO {audit} (timestamp, operation, {mirrors}, updated_values, {group_col})\nSELECT \
     {NOW}, 'insert', {keys}, {values}, {group}\nFROM {table} AS t\nORDER BY {keys}",
    audit = quote_ident(&audit_table_name(&schema.name)),
    mirrors = mirror_columns(schema),
    group_col = quote_ident(GROUP_COLUMN),
    keys = key_refs("t", schema),
    values = full_object("t", schema),
    group = current_group(),
    table = quote_ident(&schema.name),
  )
}
