//! Proxy access-log line parser.
//!
//! Recognises two dialects: `|`-delimited lines and classic
//! whitespace-delimited lines. Pure synchronous; no file or database access.
//!
//! # Quick start
//!
//! ```
//! use proxytrail_logline::{detect_dialect, parse_line};
//!
//! let line = "2026-01-01T10:00:00|10.0.0.5|-|bob|-|GET|http://example.com/a|-|200|1024|-|-|-|TCP_MISS";
//! let dialect = detect_dialect([line]);
//! let record = parse_line(line, dialect).unwrap();
//! assert_eq!(record.identity, "bob");
//! ```

pub mod error;
mod dialect;
mod parse;

pub use dialect::{DEFAULT_SAMPLE_LINES, detect_dialect};
pub use error::{Error, Result};
use proxytrail_core::record::{Dialect, ParsedRecord};

/// Parse one raw line.
///
/// Returns `Ok(None)` for anonymous lines (identity `-`), which are dropped
/// silently, and `Err` for malformed lines.
pub fn try_parse_line(line: &str, dialect: Dialect) -> Result<Option<ParsedRecord>> {
  match dialect {
    Dialect::Pipe => parse::parse_pipe(line),
    Dialect::Space => parse::parse_space(line),
  }
}

/// Parse one raw line, logging and swallowing failures.
///
/// `None` means the line carries nothing to record: it was anonymous or
/// malformed.
pub fn parse_line(line: &str, dialect: Dialect) -> Option<ParsedRecord> {
  match try_parse_line(line, dialect) {
    Ok(Some(record)) => Some(record),
    Ok(None) => {
      tracing::trace!(%dialect, "anonymous line dropped");
      None
    }
    Err(e) => {
      tracing::warn!(
        %dialect,
        error = %e,
        line = parse::strip_terminator(line),
        "skipping malformed log line"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dialect_mismatch_yields_none() {
    let space =
      "1767261600.000 10.0.0.9 - alice - GET TCP_MISS/200 http://example.com/b - 200 512";
    assert!(parse_line(space, Dialect::Pipe).is_none());
    assert!(matches!(
      try_parse_line(space, Dialect::Pipe),
      Err(Error::TooFewFields { .. })
    ));
  }

  #[test]
  fn blank_line_is_skipped_in_both_dialects() {
    assert!(parse_line("\n", Dialect::Pipe).is_none());
    assert!(parse_line("\n", Dialect::Space).is_none());
  }
}
