//! Catalog introspection: columns, primary keys, and stored DDL.

use rusqlite::{Connection, OptionalExtension as _};

use crate::{Error, Result};

/// One column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
  pub name:      String,
  /// Declared type, verbatim (may be empty).
  pub decl_type: String,
  pub not_null:  bool,
  /// 1-based position within the primary key, 0 for non-key columns.
  pub pk:        u32,
}

impl Column {
  pub fn is_pk(&self) -> bool { self.pk > 0 }
}

/// A table's columns in declaration order.
#[derive(Debug, Clone)]
pub struct TableSchema {
  pub name:    String,
  pub columns: Vec<Column>,
}

impl TableSchema {
  /// Read the live schema of `table`.
  pub fn read(conn: &Connection, table: &str) -> Result<Self> {
    let mut stmt = conn.prepare(
      "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
      .query_map([table], |row| {
        Ok(Column {
          name:      row.get(0)?,
          decl_type: row.get(1)?,
          not_null:  row.get(2)?,
          pk:        row.get(3)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.is_empty() {
      return Err(Error::TableNotFound(table.to_owned()));
    }
    Ok(Self { name: table.to_owned(), columns })
  }

  /// Primary-key columns in key order.
  pub fn pk_columns(&self) -> Vec<&Column> {
    let mut pks: Vec<&Column> = self.columns.iter().filter(|c| c.is_pk()).collect();
    pks.sort_by_key(|c| c.pk);
    pks
  }

  /// Non-key columns in declaration order.
  pub fn non_pk_columns(&self) -> Vec<&Column> {
    self.columns.iter().filter(|c| !c.is_pk()).collect()
  }

  /// Fail unless the table declares an explicit primary key.
  pub fn require_pk(&self) -> Result<()> {
    if self.columns.iter().any(Column::is_pk) {
      Ok(())
    } else {
      Err(Error::MissingPrimaryKey(self.name.clone()))
    }
  }
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
  let names = stmt
    .query_map([table], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
  Ok(column_names(conn, table)?.iter().any(|c| c == column))
}

/// The `CREATE TABLE` text SQLite stored for `table`.
pub fn create_statement(conn: &Connection, table: &str) -> Result<String> {
  conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [table],
      |row| row.get::<_, Option<String>>(0),
    )
    .optional()?
    .ok_or_else(|| Error::TableNotFound(table.to_owned()))?
    .ok_or_else(|| Error::UnreadableSchema(table.to_owned()))
}
