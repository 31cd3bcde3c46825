//! Field extraction for both dialects.
//!
//! Pipeline:
//!   raw line
//!     └─ split into fields (per dialect)
//!          └─ anonymous check (identity `-`)
//!               └─ typed fields + denied classification → ParsedRecord

use proxytrail_core::record::{Dialect, ParsedRecord};

use crate::error::{Error, Result};

pub(crate) const PIPE_MIN_FIELDS: usize = 14;
pub(crate) const SPACE_MIN_FIELDS: usize = 11;

const ANONYMOUS: &str = "-";
const DENIED_MARKER: &str = "TCP_DENIED";

// ─── Field splitting ─────────────────────────────────────────────────────────

/// Strip one trailing `\n` or `\r\n`.
pub(crate) fn strip_terminator(line: &str) -> &str {
  let line = line.strip_suffix('\n').unwrap_or(line);
  line.strip_suffix('\r').unwrap_or(line)
}

/// Split on every single space or tab; runs of separators yield empty fields.
pub(crate) fn space_fields(line: &str) -> Vec<&str> {
  strip_terminator(line).split([' ', '\t']).collect()
}

fn pipe_fields(line: &str) -> Vec<&str> {
  line.trim().split('|').collect()
}

fn require_fields(dialect: Dialect, found: usize, required: usize) -> Result<()> {
  if found < required {
    return Err(Error::TooFewFields { dialect, found, required });
  }
  Ok(())
}

fn parse_int<T: std::str::FromStr>(fields: &[&str], field: usize) -> Result<T> {
  fields[field]
    .trim()
    .parse()
    .map_err(|_| Error::InvalidInteger { field, value: fields[field].to_owned() })
}

/// Integer when the field is all ASCII digits, otherwise 0.
fn digits_or_zero<T: std::str::FromStr + Default>(field: &str) -> T {
  if !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit()) {
    field.parse().unwrap_or_default()
  } else {
    T::default()
  }
}

// ─── Dialects ────────────────────────────────────────────────────────────────

/// `Ok(None)` for anonymous lines.
pub(crate) fn parse_pipe(line: &str) -> Result<Option<ParsedRecord>> {
  let fields = pipe_fields(line);
  require_fields(Dialect::Pipe, fields.len(), PIPE_MIN_FIELDS)?;

  let identity = fields[3];
  if identity == ANONYMOUS {
    return Ok(None);
  }

  let status_code = parse_int(&fields, 8)?;
  let bytes_transferred = parse_int(&fields, 9)?;
  let dialect_status = fields[13];

  Ok(Some(ParsedRecord {
    address: fields[1].to_owned(),
    identity: identity.to_owned(),
    resource: fields[6].to_owned(),
    status_code,
    bytes_transferred,
    method: fields[5].to_owned(),
    dialect_status: dialect_status.to_owned(),
    is_denied: dialect_status.contains(DENIED_MARKER),
    logged_at: Some(fields[0].to_owned()),
  }))
}

/// `Ok(None)` for anonymous lines.
pub(crate) fn parse_space(line: &str) -> Result<Option<ParsedRecord>> {
  let fields = space_fields(line);
  require_fields(Dialect::Space, fields.len(), SPACE_MIN_FIELDS)?;

  let identity = fields[3];
  if identity == ANONYMOUS {
    return Ok(None);
  }

  Ok(Some(ParsedRecord {
    address: fields[1].to_owned(),
    identity: identity.to_owned(),
    resource: fields[7].to_owned(),
    status_code: digits_or_zero(fields[9]),
    bytes_transferred: digits_or_zero(fields[10]),
    method: fields[5].to_owned(),
    dialect_status: fields[6].to_owned(),
    // Whole line, not just the status field.
    is_denied: line.contains(DENIED_MARKER),
    logged_at: None,
  }))
}
