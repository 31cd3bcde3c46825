//! Rows buffered by the batch writer and handed to the store in one
//! transaction.

use chrono::{DateTime, Utc};

use crate::record::{ParsedRecord, UserId, UserKey};

/// A user row to insert into the day's user table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
  pub key:        UserKey,
  pub first_seen: DateTime<Utc>,
}

/// How a fact refers to its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
  /// The id was already known when the fact was buffered.
  Known(UserId),
  /// The user was enqueued in the same batch; bound during the write.
  Pending(UserKey),
}

/// A fact row for the day's fact table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFact {
  pub user:              UserRef,
  pub resource:          String,
  pub status_code:       i64,
  pub occurrence_count:  i64,
  pub bytes_transferred: u64,
  pub observed_at:       DateTime<Utc>,
}

impl NewFact {
  pub fn from_record(
    user: UserRef,
    record: &ParsedRecord,
    observed_at: DateTime<Utc>,
  ) -> Self {
    Self {
      user,
      resource: record.resource.clone(),
      status_code: record.status_code,
      occurrence_count: 1,
      bytes_transferred: record.bytes_transferred,
      observed_at,
    }
  }
}

/// A row for the long-lived `denied_logs` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDenied {
  pub identity:          String,
  pub address:           String,
  pub resource:          String,
  pub method:            String,
  pub dialect_status:    String,
  pub response_code:     Option<i64>,
  pub bytes_transferred: u64,
  pub observed_at:       DateTime<Utc>,
}

impl NewDenied {
  pub fn from_record(record: &ParsedRecord, observed_at: DateTime<Utc>) -> Self {
    Self {
      identity: record.identity.clone(),
      address: record.address.clone(),
      resource: record.resource.clone(),
      method: record.method.clone(),
      dialect_status: record.dialect_status.clone(),
      response_code: Some(record.status_code),
      bytes_transferred: record.bytes_transferred,
      observed_at,
    }
  }
}

/// Everything written by one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
  pub users:  Vec<NewUser>,
  pub facts:  Vec<NewFact>,
  pub denied: Vec<NewDenied>,
}

impl Batch {
  pub fn is_empty(&self) -> bool {
    self.users.is_empty() && self.facts.is_empty() && self.denied.is_empty()
  }

  pub fn clear(&mut self) {
    self.users.clear();
    self.facts.clear();
    self.denied.clear();
  }
}

/// What a committed batch write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
  /// Ids for every user of the batch, including pairs that turned out to
  /// already exist in the table.
  pub user_ids:       Vec<(UserKey, UserId)>,
  /// Number of user rows actually inserted.
  pub users_inserted: usize,
  pub facts_written:  usize,
  pub denied_written: usize,
  /// Users whose facts were dropped because no row could be found for them.
  pub facts_dropped:  Vec<UserKey>,
}
