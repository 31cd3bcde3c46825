//! Reasons a log line is skipped.

use proxytrail_core::record::Dialect;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("{dialect} line has {found} fields, need at least {required}")]
  TooFewFields { dialect: Dialect, found: usize, required: usize },

  #[error("invalid integer in field {field}: {value:?}")]
  InvalidInteger { field: usize, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
