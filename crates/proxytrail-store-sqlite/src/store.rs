//! [`SqliteStore`]: the SQLite implementation of [`AuditStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use proxytrail_core::{
  batch::{Batch, BatchReceipt, UserRef},
  cursor::LogCursor,
  partition::{Partition, TableName},
  record::{UserId, UserKey},
  store::AuditStore,
};

use crate::{
  Result,
  encode::{decode_dt, decode_u64, encode_dt, encode_u64},
  rows::{DeniedRow, FactRow, RawDeniedRow, RawFactRow, RawUserRow, UserRow},
  schema::{SCHEMA, partition_ddl},
};

/// Lock wait used by [`SqliteStore::open_in_memory`].
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn find_user_sql(users: &TableName) -> String {
  format!(
    "SELECT id FROM {} WHERE identity = ?1 AND address = ?2 ORDER BY id LIMIT 1",
    users.quoted()
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The audit tables backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// Missing parent directories are created.
  pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
    let path = path.as_ref();
    if let Some(dir) = path.parent()
      && !dir.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(dir).await?;
    }
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  // ── Row readers ───────────────────────────────────────────────────────────

  /// All users of a partition, in id order.
  pub async fn list_users(&self, partition: &Partition) -> Result<Vec<UserRow>> {
    let sql = format!(
      "SELECT id, identity, address, first_seen FROM {} ORDER BY id",
      partition.users.quoted()
    );

    let raws: Vec<RawUserRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawUserRow {
              id:         row.get(0)?,
              identity:   row.get(1)?,
              address:    row.get(2)?,
              first_seen: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUserRow::into_row).collect()
  }

  /// All facts of a partition, in id order.
  pub async fn list_facts(&self, partition: &Partition) -> Result<Vec<FactRow>> {
    let sql = format!(
      "SELECT id, user_ref, resource, status_code, occurrence_count,
              bytes_transferred, observed_at
       FROM {} ORDER BY id",
      partition.facts.quoted()
    );

    let raws: Vec<RawFactRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawFactRow {
              id:                row.get(0)?,
              user_ref:          row.get(1)?,
              resource:          row.get(2)?,
              status_code:       row.get(3)?,
              occurrence_count:  row.get(4)?,
              bytes_transferred: row.get(5)?,
              observed_at:       row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFactRow::into_row).collect()
  }

  /// All denied records, in id order.
  pub async fn list_denied(&self) -> Result<Vec<DeniedRow>> {
    let raws: Vec<RawDeniedRow> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, identity, address, resource, method, dialect_status,
                  response_code, bytes_transferred, observed_at
           FROM denied_logs ORDER BY id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawDeniedRow {
              id:                row.get(0)?,
              identity:          row.get(1)?,
              address:           row.get(2)?,
              resource:          row.get(3)?,
              method:            row.get(4)?,
              dialect_status:    row.get(5)?,
              response_code:     row.get(6)?,
              bytes_transferred: row.get(7)?,
              observed_at:       row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeniedRow::into_row).collect()
  }
}

// ─── AuditStore impl ─────────────────────────────────────────────────────────

impl AuditStore for SqliteStore {
  type Error = crate::Error;

  // ── Partitions ────────────────────────────────────────────────────────────

  async fn table_exists(&self, name: &TableName) -> Result<bool> {
    let name = name.as_str().to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
              rusqlite::params![name],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(exists)
  }

  async fn create_partition(&self, partition: &Partition) -> Result<()> {
    let ddl = partition_ddl(partition);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(&ddl)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(
      users = %partition.users,
      facts = %partition.facts,
      "daily partition provisioned"
    );
    Ok(())
  }

  // ── Cursor ────────────────────────────────────────────────────────────────

  async fn load_cursor(&self) -> Result<LogCursor> {
    let raw: Option<(i64, i64, String)> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_position, last_inode, last_processed
               FROM log_metadata WHERE id = 1",
              [],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some((offset, inode, at)) => Ok(LogCursor {
        offset:     decode_u64(offset),
        inode:      decode_u64(inode),
        updated_at: Some(decode_dt(&at)?),
      }),
      None => Ok(LogCursor::zero()),
    }
  }

  async fn commit_cursor(&self, offset: u64, inode: u64) -> Result<LogCursor> {
    let now        = Utc::now();
    let offset_val = encode_u64(offset);
    let inode_val  = encode_u64(inode);
    let at_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO log_metadata (id, last_position, last_inode, last_processed)
           VALUES (1, ?1, ?2, ?3)
           ON CONFLICT(id) DO UPDATE SET
             last_position  = excluded.last_position,
             last_inode     = excluded.last_inode,
             last_processed = excluded.last_processed",
          rusqlite::params![offset_val, inode_val, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(LogCursor { offset, inode, updated_at: Some(now) })
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn find_user(
    &self,
    partition: &Partition,
    key: &UserKey,
  ) -> Result<Option<UserId>> {
    let sql      = find_user_sql(&partition.users);
    let identity = key.identity.clone();
    let address  = key.address.clone();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![identity, address], |r| r.get(0))
            .optional()?,
        )
      })
      .await?;

    Ok(id.map(UserId))
  }

  // ── Batches ───────────────────────────────────────────────────────────────

  async fn write_batch(
    &self,
    partition: &Partition,
    batch: &Batch,
  ) -> Result<BatchReceipt> {
    let batch = batch.clone();
    let find_sql = find_user_sql(&partition.users);
    let insert_user_sql = format!(
      "INSERT INTO {} (identity, address, first_seen) VALUES (?1, ?2, ?3)",
      partition.users.quoted()
    );
    let insert_fact_sql = format!(
      "INSERT INTO {} (
         user_ref, resource, status_code, occurrence_count,
         bytes_transferred, observed_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      partition.facts.quoted()
    );

    let receipt = self
      .conn
      .call(move |conn| {
        // Dropping `tx` without commit rolls the whole batch back.
        let tx = conn.transaction()?;
        let mut receipt = BatchReceipt::default();
        let mut ids: HashMap<UserKey, UserId> = HashMap::new();

        {
          let mut find = tx.prepare(&find_sql)?;
          let mut insert_user = tx.prepare(&insert_user_sql)?;

          // (1) users; a pair that appeared since it was enqueued is reused.
          for user in &batch.users {
            if ids.contains_key(&user.key) {
              continue;
            }
            let existing: Option<i64> = find
              .query_row(
                rusqlite::params![user.key.identity, user.key.address],
                |r| r.get(0),
              )
              .optional()?;
            let id = match existing {
              Some(id) => id,
              None => {
                receipt.users_inserted += 1;
                insert_user.insert(rusqlite::params![
                  user.key.identity,
                  user.key.address,
                  encode_dt(user.first_seen),
                ])?
              }
            };
            ids.insert(user.key.clone(), UserId(id));
          }

          // (2) facts
          let mut insert_fact = tx.prepare(&insert_fact_sql)?;
          for fact in &batch.facts {
            let user_id = match &fact.user {
              UserRef::Known(id) => *id,
              UserRef::Pending(key) => {
                let bound = match ids.get(key) {
                  Some(id) => Some(*id),
                  None => find
                    .query_row(
                      rusqlite::params![key.identity, key.address],
                      |r| r.get(0),
                    )
                    .optional()?
                    .map(UserId),
                };
                match bound {
                  Some(id) => {
                    ids.entry(key.clone()).or_insert(id);
                    id
                  }
                  None => {
                    receipt.facts_dropped.push(key.clone());
                    continue;
                  }
                }
              }
            };
            insert_fact.execute(rusqlite::params![
              user_id.0,
              fact.resource,
              fact.status_code,
              fact.occurrence_count,
              encode_u64(fact.bytes_transferred),
              encode_dt(fact.observed_at),
            ])?;
            receipt.facts_written += 1;
          }

          // (3) denied
          let mut insert_denied = tx.prepare(
            "INSERT INTO denied_logs (
               identity, address, resource, method, dialect_status,
               response_code, bytes_transferred, observed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for denied in &batch.denied {
            insert_denied.execute(rusqlite::params![
              denied.identity,
              denied.address,
              denied.resource,
              denied.method,
              denied.dialect_status,
              denied.response_code,
              encode_u64(denied.bytes_transferred),
              encode_dt(denied.observed_at),
            ])?;
            receipt.denied_written += 1;
          }
        }

        // (4) commit
        tx.commit()?;
        receipt.user_ids = ids.into_iter().collect();
        Ok(receipt)
      })
      .await?;

    Ok(receipt)
  }
}
