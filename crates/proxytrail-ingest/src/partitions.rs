//! Provisioning and caching of daily partitions.

use std::collections::HashMap;

use proxytrail_core::{
  partition::{DateSuffix, Partition, TableName},
  store::AuditStore,
};

/// Table handles per date, kept for the lifetime of the owning
/// [`Ingester`](crate::Ingester).
#[derive(Debug, Default)]
pub struct PartitionStore {
  cache: HashMap<DateSuffix, Partition>,
}

impl PartitionStore {
  pub fn new() -> Self { Self::default() }

  /// `user_<YYYYMMDD>` / `log_<YYYYMMDD>` for `date`.
  pub fn resolve_table_names(date: DateSuffix) -> Partition { Partition::for_date(date) }

  pub async fn table_exists<S: AuditStore>(
    store: &S,
    name: &TableName,
  ) -> Result<bool, S::Error> {
    store.table_exists(name).await
  }

  /// Make sure both tables for `date` exist.
  ///
  /// Missing tables get one creation attempt. `Ok(None)` means they are still
  /// missing afterwards and the partition is unavailable for this run.
  pub async fn ensure_daily_tables<S: AuditStore>(
    &mut self,
    store: &S,
    date: DateSuffix,
  ) -> Result<Option<Partition>, S::Error> {
    if let Some(partition) = self.cache.get(&date) {
      return Ok(Some(partition.clone()));
    }

    let partition = Self::resolve_table_names(date);
    if !Self::both_exist(store, &partition).await? {
      // Creation is IF NOT EXISTS; a failure here is judged by the recheck.
      if let Err(e) = store.create_partition(&partition).await {
        tracing::warn!(
          partition = %partition.date,
          error = %e,
          "creating daily tables failed"
        );
      }
      if !Self::both_exist(store, &partition).await? {
        return Ok(None);
      }
    }

    self.cache.insert(date, partition.clone());
    Ok(Some(partition))
  }

  pub fn is_cached(&self, date: DateSuffix) -> bool { self.cache.contains_key(&date) }

  async fn both_exist<S: AuditStore>(
    store: &S,
    partition: &Partition,
  ) -> Result<bool, S::Error> {
    Ok(
      Self::table_exists(store, &partition.users).await?
        && Self::table_exists(store, &partition.facts).await?,
    )
  }
}
