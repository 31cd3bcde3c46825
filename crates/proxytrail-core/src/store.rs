//! The `AuditStore` trait: everything the ingestion pipeline needs from a
//! storage backend.
//!
//! The trait is implemented by storage backends (e.g.
//! `proxytrail-store-sqlite`). The orchestrator depends on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  batch::{Batch, BatchReceipt},
  cursor::LogCursor,
  partition::{Partition, TableName},
  record::{UserId, UserKey},
};

/// Classification the batch writer needs to decide between retrying and
/// aborting.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` for uniqueness/integrity conflicts and lock contention, which are
  /// worth retrying after a rollback.
  fn is_conflict(&self) -> bool;
}

/// Abstraction over the relational backend.
///
/// All methods return `Send` futures so the trait can be driven from a
/// multi-threaded tokio runtime.
pub trait AuditStore: Send + Sync {
  type Error: StoreError;

  // ── Partitions ────────────────────────────────────────────────────────

  /// Whether a table called `name` exists. Runs outside any transaction.
  fn table_exists<'a>(
    &'a self,
    name: &'a TableName,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Create the user and fact tables of `partition` if they are missing.
  /// Creating a table that already exists is not an error.
  fn create_partition<'a>(
    &'a self,
    partition: &'a Partition,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Cursor ────────────────────────────────────────────────────────────

  /// Load the cursor, or [`LogCursor::zero`] when none has been stored.
  fn load_cursor(
    &self,
  ) -> impl Future<Output = Result<LogCursor, Self::Error>> + Send + '_;

  /// Durably store a new cursor in its own transaction.
  fn commit_cursor(
    &self,
    offset: u64,
    inode: u64,
  ) -> impl Future<Output = Result<LogCursor, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Look up the id for `key` in the partition's user table. When the pair
  /// occurs more than once the lowest id wins.
  fn find_user<'a>(
    &'a self,
    partition: &'a Partition,
    key: &'a UserKey,
  ) -> impl Future<Output = Result<Option<UserId>, Self::Error>> + Send + 'a;

  // ── Batches ───────────────────────────────────────────────────────────

  /// Write `batch` in one transaction: users first, then facts (binding
  /// pending user references), then denied records. On error nothing of the
  /// batch is persisted.
  fn write_batch<'a>(
    &'a self,
    partition: &'a Partition,
    batch: &'a Batch,
  ) -> impl Future<Output = Result<BatchReceipt, Self::Error>> + Send + 'a;
}
