//! SQLite backend for the shop engine.
//!
//! Each aggregate is one row. Nested collections (cart lines, order lines, status history, event metadata) are stored
//! as JSON documents in a column of that row.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
