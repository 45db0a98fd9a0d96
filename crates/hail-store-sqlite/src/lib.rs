//! SQLite backend for the Hail ride store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every transition runs inside a
//! `BEGIN IMMEDIATE` transaction, so concurrent claims on the same ride are
//! serialised by SQLite's write lock, across connections and processes alike.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
