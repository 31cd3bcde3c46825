//! SQLite backend for the proxytrail audit tables.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod rows;

pub use error::{Error, Result};
pub use store::SqliteStore;
