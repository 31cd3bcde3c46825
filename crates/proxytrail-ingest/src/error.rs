//! Error type for an ingestion run.

use proxytrail_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("access log i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: StoreError>(e: E) -> Self { Error::Store(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
