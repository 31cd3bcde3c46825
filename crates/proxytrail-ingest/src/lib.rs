//! Incremental ingestion of a proxy access log into daily audit partitions.
//!
//! [`Ingester::ingest`] performs one pass: it detects rotation or truncation,
//! reads the bytes appended since the last committed cursor, and writes the
//! resulting users, facts and denied records through any [`AuditStore`].
//!
//! [`AuditStore`]: proxytrail_core::store::AuditStore

pub mod error;
pub mod ingest;
pub mod partitions;
pub mod resolver;
pub mod tracker;
pub mod writer;

pub use error::{Error, Result};
pub use ingest::{IngestOptions, IngestOutcome, IngestReport, Ingester};

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Daemon configuration, deserialised from `proxytrail.toml` and
/// `PROXYTRAIL_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Settings {
  pub log_path:               PathBuf,
  pub store_path:             PathBuf,
  pub interval_secs:          u64,
  pub batch_size:             usize,
  pub max_retries:            u32,
  pub sample_lines:           usize,
  pub rollover_grace_minutes: u32,
  pub busy_timeout_ms:        u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      log_path:               PathBuf::from("/var/log/squid/access.log"),
      store_path:             PathBuf::from("proxytrail.db"),
      interval_secs:          30,
      batch_size:             writer::DEFAULT_BATCH_SIZE,
      max_retries:            writer::DEFAULT_MAX_RETRIES,
      sample_lines:           proxytrail_logline::DEFAULT_SAMPLE_LINES,
      rollover_grace_minutes: 5,
      busy_timeout_ms:        5_000,
    }
  }
}

impl Settings {
  /// Time between scheduled runs; never zero.
  pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_secs.max(1)) }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }

  pub fn ingest_options(&self) -> IngestOptions {
    IngestOptions {
      log_path:               self.log_path.clone(),
      batch_size:             self.batch_size,
      max_retries:            self.max_retries,
      sample_lines:           self.sample_lines,
      rollover_grace_minutes: self.rollover_grace_minutes,
    }
  }
}
