//! The persisted read position within the access log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton cursor row.
///
/// `offset` always sits on a line boundary of the file identified by `inode`
/// as of the last committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogCursor {
  pub offset:     u64,
  pub inode:      u64,
  /// `None` until the cursor has been committed at least once.
  pub updated_at: Option<DateTime<Utc>>,
}

impl LogCursor {
  /// The cursor used before anything has been ingested: read from the start.
  pub fn zero() -> Self { Self::default() }

  /// Whether committing `(offset, inode)` would change the stored position.
  pub fn differs_from(&self, offset: u64, inode: u64) -> bool {
    self.updated_at.is_none() || self.offset != offset || self.inode != inode
  }
}

/// Where a run starts reading, decided from the stored cursor and a fresh
/// `stat` of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResumePoint {
  /// The file was replaced (inode changed); read from the start.
  Rotated { previous_inode: u64 },
  /// Same file but shorter than the stored offset; read from the start.
  Truncated { previous_offset: u64 },
  /// Continue from the stored offset.
  Resumed { offset: u64 },
}

impl ResumePoint {
  pub fn decide(cursor: &LogCursor, inode: u64, size: u64) -> Self {
    if cursor.inode != inode {
      ResumePoint::Rotated { previous_inode: cursor.inode }
    } else if size < cursor.offset {
      ResumePoint::Truncated { previous_offset: cursor.offset }
    } else {
      ResumePoint::Resumed { offset: cursor.offset }
    }
  }

  pub fn offset(&self) -> u64 {
    match self {
      ResumePoint::Rotated { .. } | ResumePoint::Truncated { .. } => 0,
      ResumePoint::Resumed { offset } => *offset,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored(offset: u64, inode: u64) -> LogCursor {
    LogCursor { offset, inode, updated_at: Some(Utc::now()) }
  }

  #[test]
  fn new_inode_resets_even_when_file_is_larger() {
    let point = ResumePoint::decide(&stored(100, 7), 8, 10_000);
    assert_eq!(point, ResumePoint::Rotated { previous_inode: 7 });
    assert_eq!(point.offset(), 0);
  }

  #[test]
  fn shrunk_file_resets() {
    let point = ResumePoint::decide(&stored(100, 7), 7, 40);
    assert_eq!(point, ResumePoint::Truncated { previous_offset: 100 });
    assert_eq!(point.offset(), 0);
  }

  #[test]
  fn same_file_resumes_at_offset() {
    let point = ResumePoint::decide(&stored(100, 7), 7, 100);
    assert_eq!(point.offset(), 100);
  }

  #[test]
  fn zero_cursor_counts_as_rotation_of_any_real_file() {
    let point = ResumePoint::decide(&LogCursor::zero(), 42, 10);
    assert_eq!(point.offset(), 0);
  }

  #[test]
  fn unchanged_position_is_not_rewritten() {
    let c = stored(10, 3);
    assert!(!c.differs_from(10, 3));
    assert!(c.differs_from(11, 3));
    assert!(LogCursor::zero().differs_from(0, 0));
  }
}
