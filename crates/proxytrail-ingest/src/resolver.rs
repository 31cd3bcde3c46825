//! Run-scoped mapping from `(identity, address)` to user ids.

use std::collections::HashMap;

use proxytrail_core::{
  partition::Partition,
  record::{UserId, UserKey},
  store::AuditStore,
};

/// How a fact should refer to its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  /// The row exists.
  Known(UserId),
  /// An insertion is already enqueued in the current batch.
  Pending,
  /// First sighting: the caller must enqueue the insertion.
  Enqueue,
}

/// Cache in front of the day's user table. A `None` value is a placeholder:
/// insertion enqueued, id not known yet.
#[derive(Debug, Default)]
pub struct UserResolver {
  cache: HashMap<UserKey, Option<UserId>>,
}

impl UserResolver {
  pub fn new() -> Self { Self::default() }

  pub async fn resolve<S: AuditStore>(
    &mut self,
    store: &S,
    partition: &Partition,
    key: &UserKey,
  ) -> Result<Resolution, S::Error> {
    match self.cache.get(key) {
      Some(Some(id)) => return Ok(Resolution::Known(*id)),
      Some(None) => return Ok(Resolution::Pending),
      None => {}
    }

    match store.find_user(partition, key).await? {
      Some(id) => {
        self.cache.insert(key.clone(), Some(id));
        Ok(Resolution::Known(id))
      }
      None => {
        self.cache.insert(key.clone(), None);
        Ok(Resolution::Enqueue)
      }
    }
  }

  /// Write back an id produced by a flush, replacing any placeholder.
  pub fn record(&mut self, key: UserKey, id: UserId) {
    self.cache.insert(key, Some(id));
  }

  /// Forget `keys` so their next occurrence is looked up again.
  pub fn evict<'k>(&mut self, keys: impl IntoIterator<Item = &'k UserKey>) {
    for key in keys {
      self.cache.remove(key);
    }
  }

  /// `Some(None)` for a placeholder, `None` when the key is not cached.
  pub fn cached(&self, key: &UserKey) -> Option<Option<UserId>> {
    self.cache.get(key).copied()
  }
}
