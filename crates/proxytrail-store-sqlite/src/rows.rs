//! Rows as stored, read back for audits and tests.

use chrono::{DateTime, Utc};
use proxytrail_core::record::UserId;

use crate::{
  Result,
  encode::{decode_dt, decode_u64},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
  pub id:         UserId,
  pub identity:   String,
  pub address:    String,
  pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
  pub id:                i64,
  pub user_ref:          UserId,
  pub resource:          String,
  pub status_code:       i64,
  pub occurrence_count:  i64,
  pub bytes_transferred: u64,
  pub observed_at:       DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedRow {
  pub id:                i64,
  pub identity:          String,
  pub address:           String,
  pub resource:          String,
  pub method:            String,
  pub dialect_status:    String,
  pub response_code:     Option<i64>,
  pub bytes_transferred: u64,
  pub observed_at:       DateTime<Utc>,
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Column values read directly from a daily user row.
pub(crate) struct RawUserRow {
  pub id:         i64,
  pub identity:   String,
  pub address:    String,
  pub first_seen: String,
}

impl RawUserRow {
  pub fn into_row(self) -> Result<UserRow> {
    Ok(UserRow {
      id:         UserId(self.id),
      identity:   self.identity,
      address:    self.address,
      first_seen: decode_dt(&self.first_seen)?,
    })
  }
}

/// Column values read directly from a daily fact row.
pub(crate) struct RawFactRow {
  pub id:                i64,
  pub user_ref:          i64,
  pub resource:          String,
  pub status_code:       i64,
  pub occurrence_count:  i64,
  pub bytes_transferred: i64,
  pub observed_at:       String,
}

impl RawFactRow {
  pub fn into_row(self) -> Result<FactRow> {
    Ok(FactRow {
      id:                self.id,
      user_ref:          UserId(self.user_ref),
      resource:          self.resource,
      status_code:       self.status_code,
      occurrence_count:  self.occurrence_count,
      bytes_transferred: decode_u64(self.bytes_transferred),
      observed_at:       decode_dt(&self.observed_at)?,
    })
  }
}

/// Column values read directly from a `denied_logs` row.
pub(crate) struct RawDeniedRow {
  pub id:                i64,
  pub identity:          String,
  pub address:           String,
  pub resource:          String,
  pub method:            String,
  pub dialect_status:    String,
  pub response_code:     Option<i64>,
  pub bytes_transferred: i64,
  pub observed_at:       String,
}

impl RawDeniedRow {
  pub fn into_row(self) -> Result<DeniedRow> {
    Ok(DeniedRow {
      id:                self.id,
      identity:          self.identity,
      address:           self.address,
      resource:          self.resource,
      method:            self.method,
      dialect_status:    self.dialect_status,
      response_code:     self.response_code,
      bytes_transferred: decode_u64(self.bytes_transferred),
      observed_at:       decode_dt(&self.observed_at)?,
    })
  }
}
