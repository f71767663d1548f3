//! SQLite engine for JSON audit-log history tracking.
//!
//! Tracking a table installs three triggers that append one row per
//! insert, update, and delete to an audit table named
//! `_history_json_<table>`. Each row stores the operation, the row's key,
//! and a JSON object of the values written: the full row for inserts, only
//! the changed columns for updates, nothing for deletes. SQL NULL is stored
//! as `{"null": 1}` and BLOBs as `{"hex": "..."}` so that replay can tell
//! "set to NULL" from "unchanged".
//!
//! The synchronous functions in each module operate on a plain
//! [`rusqlite::Connection`]. [`SqliteHistory`] wraps them behind the async
//! [`history_core::store::HistoryStore`] trait using [`tokio_rusqlite`].

pub mod batch;
pub mod encode;
pub mod group;
pub mod history;
pub mod names;
pub mod restore;
pub mod row_state;
pub mod schema;
pub mod triggers;
pub mod tracking;
pub mod upgrade;

mod store;

pub mod error;

pub use batch::run_batch;
pub use error::{Error, Result};
pub use group::{ChangeGroup, change_group};
pub use history::{get_history, get_row_history};
pub use restore::{restore, retarget_create_statement};
pub use row_state::{row_state, row_state_query};
pub use store::SqliteHistory;
pub use tracking::{TriggerRevision, disable_tracking, enable_tracking, populate, tracking_revision};
pub use upgrade::{apply_upgrade, detect_upgrades, find_audit_tables};

#[cfg(test)]
mod tests;
