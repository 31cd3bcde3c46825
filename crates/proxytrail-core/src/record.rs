//! Parsed access-log records and the identities they resolve to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two access-log line formats the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
  /// `|`-delimited lines with at least 14 fields.
  Pipe,
  /// Whitespace-delimited lines with at least 11 fields.
  Space,
}

impl fmt::Display for Dialect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Dialect::Pipe => f.write_str("pipe"),
      Dialect::Space => f.write_str("space"),
    }
  }
}

/// Structured fields extracted from a single log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
  pub address:           String,
  pub identity:          String,
  pub resource:          String,
  pub status_code:       i64,
  pub bytes_transferred: u64,
  pub method:            String,
  /// Proxy result code, e.g. `TCP_MISS/200` or `TCP_DENIED`.
  pub dialect_status:    String,
  pub is_denied:         bool,
  /// Raw timestamp field; only the pipe dialect carries one.
  pub logged_at:         Option<String>,
}

impl ParsedRecord {
  pub fn user_key(&self) -> UserKey {
    UserKey::new(&self.identity, &self.address)
  }
}

/// The logical key of a daily user row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey {
  pub identity: String,
  pub address:  String,
}

impl UserKey {
  pub fn new(identity: impl Into<String>, address: impl Into<String>) -> Self {
    Self { identity: identity.into(), address: address.into() }
  }
}

impl fmt::Display for UserKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.identity, self.address)
  }
}

/// Row id of a user within one day's user table.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}
