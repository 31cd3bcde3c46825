//! Buffered, transactional writes with bounded retry on conflicts.

use chrono::{DateTime, Utc};
use proxytrail_core::{
  batch::{Batch, BatchReceipt, NewDenied, NewFact, NewUser},
  partition::Partition,
  record::UserKey,
  store::{AuditStore, StoreError},
};

use crate::resolver::UserResolver;

pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Attempts per flush before a conflicting batch is discarded.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
  Accumulating,
  Flushing,
  Retrying,
  Committed,
  Aborted,
}

/// Result of a flush that did not hit a storage fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
  Committed(BatchReceipt),
  /// Conflicts outlasted the retry budget; the buffered rows were dropped.
  Discarded { users: usize, facts: usize, denied: usize },
}

/// The three buffers of pending rows: new users, facts and denied records.
#[derive(Debug)]
pub struct BatchWriter {
  batch:       Batch,
  batch_size:  usize,
  max_retries: u32,
  retries:     u32,
  state:       WriterState,
}

impl BatchWriter {
  pub fn new(batch_size: usize, max_retries: u32) -> Self {
    Self {
      batch:       Batch::default(),
      batch_size:  batch_size.max(1),
      max_retries: max_retries.max(1),
      retries:     0,
      state:       WriterState::Accumulating,
    }
  }

  pub fn state(&self) -> WriterState { self.state }

  pub fn pending(&self) -> &Batch { &self.batch }

  pub fn enqueue_user(&mut self, key: UserKey, first_seen: DateTime<Utc>) {
    self.state = WriterState::Accumulating;
    self.batch.users.push(NewUser { key, first_seen });
  }

  pub fn enqueue_fact(&mut self, fact: NewFact) {
    self.state = WriterState::Accumulating;
    self.batch.facts.push(fact);
  }

  pub fn enqueue_denied(&mut self, denied: NewDenied) {
    self.state = WriterState::Accumulating;
    self.batch.denied.push(denied);
  }

  /// Whether any buffer has reached the batch size.
  pub fn should_flush(&self) -> bool {
    self.batch.users.len() >= self.batch_size
      || self.batch.facts.len() >= self.batch_size
      || self.batch.denied.len() >= self.batch_size
  }

  /// Write everything buffered in one transaction.
  ///
  /// On commit the generated user ids are written back into `resolver`. On a
  /// conflict the batch's new users are evicted from `resolver` and the write
  /// is retried; once the retry budget is spent the buffers are discarded.
  /// Any other error is returned and leaves the writer `Aborted`.
  pub async fn flush<S: AuditStore>(
    &mut self,
    store: &S,
    partition: &Partition,
    resolver: &mut UserResolver,
  ) -> Result<FlushOutcome, S::Error> {
    if self.batch.is_empty() {
      self.state = WriterState::Committed;
      return Ok(FlushOutcome::Committed(BatchReceipt::default()));
    }

    self.state = WriterState::Flushing;
    loop {
      match store.write_batch(partition, &self.batch).await {
        Ok(receipt) => {
          for (key, id) in &receipt.user_ids {
            resolver.record(key.clone(), *id);
          }
          for key in &receipt.facts_dropped {
            tracing::error!(user = %key, "user row missing after flush; fact dropped");
          }
          tracing::debug!(
            users = receipt.users_inserted,
            facts = receipt.facts_written,
            denied = receipt.denied_written,
            "batch committed"
          );
          self.batch.clear();
          self.retries = 0;
          self.state = WriterState::Committed;
          return Ok(FlushOutcome::Committed(receipt));
        }
        Err(e) if e.is_conflict() => {
          resolver.evict(self.batch.users.iter().map(|u| &u.key));
          self.retries += 1;
          if self.retries >= self.max_retries {
            let discarded = FlushOutcome::Discarded {
              users:  self.batch.users.len(),
              facts:  self.batch.facts.len(),
              denied: self.batch.denied.len(),
            };
            tracing::error!(
              error = %e,
              attempts = self.retries,
              "integrity conflict persisted; discarding batch"
            );
            self.batch.clear();
            self.retries = 0;
            self.state = WriterState::Accumulating;
            return Ok(discarded);
          }
          tracing::warn!(error = %e, retry = self.retries, "integrity conflict; retrying batch");
          self.state = WriterState::Retrying;
        }
        Err(e) => {
          tracing::error!(error = %e, "storage fault; aborting batch");
          self.state = WriterState::Aborted;
          return Err(e);
        }
      }
    }
  }
}
