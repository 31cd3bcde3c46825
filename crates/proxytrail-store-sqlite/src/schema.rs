//! SQL schema for the proxytrail SQLite store.
//!
//! [`SCHEMA`] holds the fixed tables and runs once at connection startup.
//! Per-day tables share one template, instantiated with a validated
//! [`TableName`].

use proxytrail_core::partition::{Partition, TableName};

/// Fixed-table DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Single cursor row; id is pinned to 1.
CREATE TABLE IF NOT EXISTS log_metadata (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    last_position  INTEGER NOT NULL DEFAULT 0,
    last_inode     INTEGER NOT NULL DEFAULT 0,
    last_processed TEXT    NOT NULL      -- ISO 8601 UTC
);

-- Rejected requests of every day. Append-only.
CREATE TABLE IF NOT EXISTS denied_logs (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    identity          TEXT    NOT NULL,
    address           TEXT    NOT NULL,
    resource          TEXT    NOT NULL,
    method            TEXT    NOT NULL DEFAULT '',
    dialect_status    TEXT    NOT NULL DEFAULT '',
    response_code     INTEGER,
    bytes_transferred INTEGER NOT NULL DEFAULT 0,
    observed_at       TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS denied_logs_observed_idx ON denied_logs(observed_at);

PRAGMA user_version = 1;
";

/// DDL for one day's user table. `(identity, address)` is not declared
/// unique; lookups take the lowest id.
pub fn users_ddl(users: &TableName) -> String {
  let table = users.quoted();
  format!(
    "CREATE TABLE IF NOT EXISTS {table} (
         id          INTEGER PRIMARY KEY AUTOINCREMENT,
         identity    TEXT NOT NULL,
         address     TEXT NOT NULL,
         first_seen  TEXT NOT NULL
     );
     CREATE INDEX IF NOT EXISTS \"{users}_key_idx\" ON {table}(identity, address);"
  )
}

/// DDL for one day's fact table, referencing the same day's user table.
pub fn facts_ddl(facts: &TableName, users: &TableName) -> String {
  let table = facts.quoted();
  let users_table = users.quoted();
  format!(
    "CREATE TABLE IF NOT EXISTS {table} (
         id                INTEGER PRIMARY KEY AUTOINCREMENT,
         user_ref          INTEGER NOT NULL REFERENCES {users_table}(id),
         resource          TEXT    NOT NULL,
         status_code       INTEGER NOT NULL,
         occurrence_count  INTEGER NOT NULL DEFAULT 1,
         bytes_transferred INTEGER NOT NULL DEFAULT 0,
         observed_at       TEXT    NOT NULL
     );
     CREATE INDEX IF NOT EXISTS \"{facts}_user_idx\"     ON {table}(user_ref);
     CREATE INDEX IF NOT EXISTS \"{facts}_observed_idx\" ON {table}(observed_at);"
  )
}

/// Both daily tables, users first so the foreign key target exists.
pub fn partition_ddl(partition: &Partition) -> String {
  format!(
    "{}\n{}",
    users_ddl(&partition.users),
    facts_ddl(&partition.facts, &partition.users)
  )
}
