//! Error type for `proxytrail-store-sqlite`.

use proxytrail_core::store::StoreError;
use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] proxytrail_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn is_conflict(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => is_conflict(e),
      _ => false,
    }
  }
}

/// Uniqueness violations and lock contention; other constraint failures
/// (foreign keys, NOT NULL, CHECK) are faults.
pub(crate) fn is_conflict(e: &rusqlite::Error) -> bool {
  let rusqlite::Error::SqliteFailure(failure, _) = e else {
    return false;
  };
  match failure.code {
    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => true,
    ErrorCode::ConstraintViolation => matches!(
      failure.extended_code,
      ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    ),
    _ => false,
  }
}
