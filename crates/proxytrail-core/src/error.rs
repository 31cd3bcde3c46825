//! Error types for `proxytrail-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid table name: {0:?}")]
  InvalidTableName(String),

  #[error("invalid date suffix: {0:?}")]
  InvalidDateSuffix(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
