//! Names of the per-day user/fact tables.
//!
//! Table names end up interpolated into DDL and DML, so every name passes
//! through [`TableName`] validation first and backends must quote it.

use std::{fmt, str::FromStr};

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// Longest identifier accepted by [`TableName`].
pub const MAX_TABLE_NAME_LEN: usize = 63;

// ─── Date suffix ─────────────────────────────────────────────────────────────

/// A calendar day rendered as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateSuffix(NaiveDate);

impl DateSuffix {
  pub fn new(date: NaiveDate) -> Self { Self(date) }

  pub fn date(&self) -> NaiveDate { self.0 }

  /// The partition day for a run starting at local time `now`.
  ///
  /// Within `grace_minutes` after midnight the previous day is returned so a
  /// run that began just before midnight keeps its partition.
  pub fn for_local_time(now: NaiveDateTime, grace_minutes: u32) -> Self {
    let since_midnight = now.hour() * 60 + now.minute();
    if since_midnight < grace_minutes {
      Self(now.date() - Duration::days(1))
    } else {
      Self(now.date())
    }
  }
}

impl fmt::Display for DateSuffix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format("%Y%m%d"))
  }
}

impl FromStr for DateSuffix {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::InvalidDateSuffix(s.to_owned()));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d")
      .map(Self)
      .map_err(|_| Error::InvalidDateSuffix(s.to_owned()))
  }
}

impl Serialize for DateSuffix {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

// ─── Table name ──────────────────────────────────────────────────────────────

/// A SQL identifier restricted to `[a-z_][a-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
  pub fn new(name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    let mut bytes = name.bytes();
    let valid_head = matches!(bytes.next(), Some(b'a'..=b'z' | b'_'));
    let valid_tail =
      bytes.all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'));
    if valid_head && valid_tail && name.len() <= MAX_TABLE_NAME_LEN {
      Ok(Self(name))
    } else {
      Err(Error::InvalidTableName(name))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Double-quoted form for interpolation into SQL text.
  pub fn quoted(&self) -> String { format!("\"{}\"", self.0) }
}

impl fmt::Display for TableName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Serialize for TableName {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0)
  }
}

// ─── Partition ───────────────────────────────────────────────────────────────

/// The pair of tables holding one day of traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Partition {
  pub date:  DateSuffix,
  pub users: TableName,
  pub facts: TableName,
}

impl Partition {
  /// `user_<YYYYMMDD>` and `log_<YYYYMMDD>` for `date`.
  pub fn for_date(date: DateSuffix) -> Self {
    // Digits and underscores only; always a valid identifier.
    Self {
      date,
      users: TableName(format!("user_{date}")),
      facts: TableName(format!("log_{date}")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
      .and_hms_opt(h, min, 0)
      .unwrap()
  }

  #[test]
  fn names_are_keyed_by_date() {
    let date: DateSuffix = "20260101".parse().unwrap();
    let p = Partition::for_date(date);
    assert_eq!(p.users.as_str(), "user_20260101");
    assert_eq!(p.facts.as_str(), "log_20260101");
    assert_eq!(p.users.quoted(), "\"user_20260101\"");
  }

  #[test]
  fn date_suffix_rejects_garbage() {
    assert!("2026010".parse::<DateSuffix>().is_err());
    assert!("20261301".parse::<DateSuffix>().is_err());
    assert!("2026-1-1".parse::<DateSuffix>().is_err());
    assert!("20260230".parse::<DateSuffix>().is_err());
  }

  #[test]
  fn table_name_rejects_injection() {
    assert!(TableName::new("user_20260101").is_ok());
    assert!(TableName::new("user\"; DROP TABLE x; --").is_err());
    assert!(TableName::new("1abc").is_err());
    assert!(TableName::new("").is_err());
    assert!(TableName::new("Users").is_err());
    assert!(TableName::new("a".repeat(64)).is_err());
  }

  #[test]
  fn grace_window_keeps_previous_day() {
    let d = DateSuffix::for_local_time(at(2026, 1, 2, 0, 3), 5);
    assert_eq!(d.to_string(), "20260101");

    let d = DateSuffix::for_local_time(at(2026, 1, 2, 0, 5), 5);
    assert_eq!(d.to_string(), "20260102");

    let d = DateSuffix::for_local_time(at(2026, 3, 1, 0, 0), 5);
    assert_eq!(d.to_string(), "20260228");
  }

  #[test]
  fn zero_grace_disables_window() {
    let d = DateSuffix::for_local_time(at(2026, 1, 2, 0, 0), 0);
    assert_eq!(d.to_string(), "20260102");
  }
}
