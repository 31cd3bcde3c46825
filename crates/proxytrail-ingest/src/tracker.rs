//! Position tracking: where the previous run stopped and whether the file
//! changed underneath it.

use std::fs::Metadata;

use proxytrail_core::{
  cursor::{LogCursor, ResumePoint},
  store::AuditStore,
};

/// The identity and length of the log file at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
  pub inode: u64,
  pub size:  u64,
}

impl FileIdentity {
  #[cfg(unix)]
  pub fn from_metadata(meta: &Metadata) -> Self {
    use std::os::unix::fs::MetadataExt as _;
    Self { inode: meta.ino(), size: meta.len() }
  }

  /// Without inodes only truncation can be detected.
  #[cfg(not(unix))]
  pub fn from_metadata(meta: &Metadata) -> Self { Self { inode: 0, size: meta.len() } }
}

/// The stored cursor plus the logic to move it.
#[derive(Debug, Clone)]
pub struct PositionTracker {
  stored: LogCursor,
}

impl PositionTracker {
  pub async fn load<S: AuditStore>(store: &S) -> Result<Self, S::Error> {
    Ok(Self { stored: store.load_cursor().await? })
  }

  pub fn stored(&self) -> &LogCursor { &self.stored }

  pub fn resume_point(&self, file: &FileIdentity) -> ResumePoint {
    ResumePoint::decide(&self.stored, file.inode, file.size)
  }

  /// Persist `(offset, inode)` unless it is already the stored position.
  /// Returns the new cursor when a write happened.
  pub async fn commit<S: AuditStore>(
    &mut self,
    store: &S,
    offset: u64,
    inode: u64,
  ) -> Result<Option<LogCursor>, S::Error> {
    if !self.stored.differs_from(offset, inode) {
      return Ok(None);
    }
    let cursor = store.commit_cursor(offset, inode).await?;
    tracing::debug!(offset, inode, "cursor committed");
    self.stored = cursor;
    Ok(Some(cursor))
  }
}
