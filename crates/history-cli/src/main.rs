//! `history-json`: track, inspect and restore SQLite table history.
//!
//! # Usage
//!
//! ```text
//! history-json data.db enable items
//! history-json data.db history items -n 10
//! history-json data.db row-history user_roles 1 2
//! history-json data.db restore items --timestamp "2024-03-01 12:00" --replace-table
//! history-json data.db upgrade --dry-run
//! ```
//!
//! JSON and SQL go to standard output; status messages and logs go to
//! standard error.

mod commands;

use std::{io, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "history-json",
  version,
  about = "SQLite table history tracking using a JSON audit log"
)]
pub struct Args {
  /// Path to the SQLite database file.
  pub database: PathBuf,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Enable tracking for a table.
  Enable {
    table:       String,
    /// Skip populating the audit log with existing rows.
    #[arg(long)]
    no_populate: bool,
  },

  /// Disable tracking for a table. The audit log is kept.
  Disable { table: String },

  /// Show audit log entries for a table, newest first.
  History {
    table: String,
    /// Maximum number of entries to show.
    #[arg(short = 'n')]
    limit: Option<usize>,
  },

  /// Show audit log entries for one row.
  RowHistory {
    table:     String,
    /// Primary key values in key column order.
    #[arg(required = true)]
    pk_values: Vec<String>,
    /// Maximum number of entries to show.
    #[arg(short = 'n')]
    limit:     Option<usize>,
  },

  /// Restore a table from its audit log.
  Restore {
    table:         String,
    /// Restore up to this audit log entry id (inclusive).
    #[arg(long)]
    id:            Option<i64>,
    /// Restore up to this timestamp (inclusive).
    #[arg(long)]
    timestamp:     Option<String>,
    /// Name for the restored table.
    #[arg(long, conflicts_with_all = ["replace_table", "output_db"])]
    new_table:     Option<String>,
    /// Replace the original table with the restored version.
    #[arg(long, conflicts_with = "output_db")]
    replace_table: bool,
    /// Write the restored table to a different database file.
    #[arg(long, value_name = "PATH")]
    output_db:     Option<PathBuf>,
  },

  /// Print the SQL that reconstructs a row's state at a given entry id.
  RowStateSql { table: String },

  /// Bring audit tables written by older versions up to date.
  Upgrade {
    /// Report what would change without changing anything.
    #[arg(long)]
    dry_run: bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let result = commands::run(
    &args.database,
    args.command,
    &mut io::stdout().lock(),
    &mut io::stderr().lock(),
  );

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("Error: {e:#}");
      ExitCode::FAILURE
    }
  }
}
