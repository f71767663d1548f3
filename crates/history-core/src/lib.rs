//! Core types and trait definitions for JSON audit-log history tracking.
//!
//! This crate is deliberately free of database and HTTP dependencies. The
//! SQLite engine (`history-store-sqlite`), the HTTP layer (`history-api`) and
//! the command-line tool (`history-cli`) all depend on it.

// Native `async fn` in traits; the futures are `Send`-bounded explicitly.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod entry;
pub mod error;
pub mod key;
pub mod restore;
pub mod store;
pub mod upgrade;

pub use error::{Classify, Error, Result};
