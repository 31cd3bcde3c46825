//! Encoding helpers between Rust domain types and SQLite column values.
//!
//! Timestamps are stored as RFC 3339 strings. Unsigned 64-bit counters
//! (offsets, inodes, byte counts) are stored bit-for-bit in SQLite's signed
//! INTEGER, so values above `i64::MAX` read back unchanged.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_u64(v: u64) -> i64 { v as i64 }

pub fn decode_u64(v: i64) -> u64 { v as u64 }
