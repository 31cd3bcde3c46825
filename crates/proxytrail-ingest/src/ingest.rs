//! The ingestion orchestrator.
//!
//! One call to [`Ingester::ingest`] walks:
//!   START
//!     └─ DIALECT_DETECTED
//!          └─ CURSOR_LOADED → ROTATED | TRUNCATED | RESUMED
//!               └─ STREAMING (flush whenever a buffer fills)
//!                    └─ DRAINING (final flush)
//!                         └─ FINALIZED (cursor commit)

use std::{
  io::SeekFrom,
  path::{Path, PathBuf},
  time::Instant,
};

use chrono::{Local, NaiveDateTime, Utc};
use proxytrail_core::{
  batch::{BatchReceipt, NewDenied, NewFact, UserRef},
  cursor::{LogCursor, ResumePoint},
  partition::{DateSuffix, Partition},
  record::Dialect,
  store::AuditStore,
};
use proxytrail_logline::{detect_dialect, parse_line};
use serde::Serialize;
use tokio::{
  fs::File,
  io::{AsyncBufReadExt as _, AsyncSeekExt as _, BufReader},
};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  partitions::PartitionStore,
  resolver::{Resolution, UserResolver},
  tracker::{FileIdentity, PositionTracker},
  writer::{BatchWriter, FlushOutcome},
};

/// Source of the local wall-clock time used to pick the partition day.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime { Local::now().naive_local() }

// ─── Options & report ────────────────────────────────────────────────────────

/// What to ingest and how.
#[derive(Debug, Clone)]
pub struct IngestOptions {
  pub log_path:               PathBuf,
  pub batch_size:             usize,
  pub max_retries:            u32,
  pub sample_lines:           usize,
  pub rollover_grace_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
  /// The log file is missing or unreadable; nothing was touched.
  SourceUnavailable,
  /// Today's tables could not be provisioned; nothing was touched.
  PartitionUnavailable,
  /// The file was read to its last complete line.
  Completed,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
  pub run_id:            Uuid,
  pub log_path:          PathBuf,
  pub outcome:           IngestOutcome,
  pub partition:         Option<DateSuffix>,
  pub dialect:           Option<Dialect>,
  pub resume:            Option<ResumePoint>,
  pub lines_read:        u64,
  pub lines_skipped:     u64,
  pub users_inserted:    u64,
  pub facts_written:     u64,
  pub denied_written:    u64,
  pub facts_dropped:     u64,
  pub batches_committed: u64,
  pub batches_discarded: u64,
  /// The cursor written by this run, if it moved.
  pub cursor:            Option<LogCursor>,
  pub elapsed_ms:        u64,
}

impl IngestReport {
  fn new(log_path: &Path) -> Self {
    Self {
      run_id:            Uuid::new_v4(),
      log_path:          log_path.to_path_buf(),
      outcome:           IngestOutcome::SourceUnavailable,
      partition:         None,
      dialect:           None,
      resume:            None,
      lines_read:        0,
      lines_skipped:     0,
      users_inserted:    0,
      facts_written:     0,
      denied_written:    0,
      facts_dropped:     0,
      batches_committed: 0,
      batches_discarded: 0,
      cursor:            None,
      elapsed_ms:        0,
    }
  }

  fn absorb(&mut self, receipt: &BatchReceipt) {
    self.users_inserted += receipt.users_inserted as u64;
    self.facts_written += receipt.facts_written as u64;
    self.denied_written += receipt.denied_written as u64;
    self.facts_dropped += receipt.facts_dropped.len() as u64;
    self.batches_committed += 1;
  }

  /// Throughput of the run; 0 when it finished within a millisecond.
  pub fn lines_per_second(&self) -> f64 {
    if self.elapsed_ms == 0 {
      return 0.0;
    }
    self.lines_read as f64 * 1000.0 / self.elapsed_ms as f64
  }
}

// ─── Per-run state ───────────────────────────────────────────────────────────

struct Run {
  partition:     Partition,
  dialect:       Dialect,
  writer:        BatchWriter,
  resolver:      UserResolver,
  /// End of the last complete line read.
  read_offset:   u64,
  /// End of the last line covered by a committed flush.
  confirmed:     u64,
  committed_any: bool,
}

// ─── Ingester ────────────────────────────────────────────────────────────────

/// Owns the store handle, the options and the partition cache. Invoke
/// [`ingest`](Self::ingest) from a scheduler that never overlaps runs.
pub struct Ingester<S> {
  store:      S,
  options:    IngestOptions,
  partitions: PartitionStore,
  clock:      Clock,
}

impl<S: AuditStore> Ingester<S> {
  pub fn new(store: S, options: IngestOptions) -> Self {
    Self { store, options, partitions: PartitionStore::new(), clock: local_now }
  }

  /// Replace the wall clock, e.g. to pin the partition day in tests.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn options(&self) -> &IngestOptions { &self.options }

  pub fn partitions(&self) -> &PartitionStore { &self.partitions }

  /// Ingest everything appended to the log since the last committed cursor.
  ///
  /// Unavailable sources and partitions are reported, not raised. Storage
  /// faults and I/O errors while streaming are returned after the cursor
  /// has been moved to the last committed batch, if any.
  pub async fn ingest(&mut self) -> Result<IngestReport> {
    let started = Instant::now();
    let mut report = IngestReport::new(&self.options.log_path);
    let span = tracing::info_span!("ingest", run_id = %report.run_id);

    let result = self.run(&mut report).instrument(span.clone()).await;
    report.elapsed_ms = started.elapsed().as_millis() as u64;

    span.in_scope(|| match &result {
      Ok(()) => tracing::info!(
        outcome = ?report.outcome,
        lines = report.lines_read,
        skipped = report.lines_skipped,
        users = report.users_inserted,
        facts = report.facts_written,
        denied = report.denied_written,
        dropped = report.facts_dropped,
        discarded_batches = report.batches_discarded,
        elapsed_ms = report.elapsed_ms,
        lines_per_sec = report.lines_per_second(),
        "ingestion finished"
      ),
      Err(e) => tracing::error!(
        error = %e,
        lines = report.lines_read,
        facts = report.facts_written,
        "ingestion failed"
      ),
    });
    result.map(|()| report)
  }

  async fn run(&mut self, report: &mut IngestReport) -> Result<()> {
    let path = self.options.log_path.clone();

    // START: nothing to do without a file.
    if let Err(e) = tokio::fs::metadata(&path).await {
      tracing::warn!(path = %path.display(), error = %e, "access log unavailable");
      return Ok(());
    }

    let date = DateSuffix::for_local_time(
      (self.clock)(),
      self.options.rollover_grace_minutes,
    );
    report.partition = Some(date);
    let Some(partition) = self
      .partitions
      .ensure_daily_tables(&self.store, date)
      .await
      .map_err(Error::store)?
    else {
      tracing::error!(partition = %date, "daily tables unavailable; skipping run");
      report.outcome = IngestOutcome::PartitionUnavailable;
      return Ok(());
    };

    // DIALECT_DETECTED
    let sample = match read_sample(&path, self.options.sample_lines).await {
      Ok(sample) => sample,
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "access log unreadable");
        return Ok(());
      }
    };
    let dialect = detect_dialect(&sample);
    report.dialect = Some(dialect);

    // CURSOR_LOADED
    let mut tracker = PositionTracker::load(&self.store)
      .await
      .map_err(Error::store)?;
    let (file, identity) = match open_with_identity(&path).await {
      Ok(opened) => opened,
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "access log unavailable");
        return Ok(());
      }
    };
    let resume = tracker.resume_point(&identity);
    report.resume = Some(resume);
    match resume {
      _ if tracker.stored().updated_at.is_none() => {
        tracing::info!(inode = identity.inode, "no stored cursor; reading from start")
      }
      ResumePoint::Rotated { previous_inode } => tracing::info!(
        previous_inode,
        inode = identity.inode,
        "log rotation detected; reading from start"
      ),
      ResumePoint::Truncated { previous_offset } => tracing::warn!(
        previous_offset,
        size = identity.size,
        "log truncated; reading from start"
      ),
      ResumePoint::Resumed { offset } => {
        tracing::debug!(offset, size = identity.size, "resuming")
      }
    }
    report.outcome = IngestOutcome::Completed;

    let mut run = Run {
      partition,
      dialect,
      writer: BatchWriter::new(self.options.batch_size, self.options.max_retries),
      resolver: UserResolver::new(),
      read_offset: resume.offset(),
      confirmed: resume.offset(),
      committed_any: false,
    };

    // STREAMING + DRAINING
    let streamed = self.stream(file, &mut run, report).await;

    // FINALIZED: the cursor only moves past committed batches.
    if run.committed_any {
      match tracker
        .commit(&self.store, run.confirmed, identity.inode)
        .await
      {
        Ok(cursor) => report.cursor = cursor,
        Err(e) if streamed.is_ok() => return Err(Error::store(e)),
        Err(e) => tracing::error!(error = %e, "cursor commit failed after aborted run"),
      }
    }
    streamed
  }

  async fn stream(
    &self,
    mut file: File,
    run: &mut Run,
    report: &mut IngestReport,
  ) -> Result<()> {
    file.seek(SeekFrom::Start(run.read_offset)).await?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    loop {
      buf.clear();
      let n = reader.read_until(b'\n', &mut buf).await?;
      if n == 0 {
        break;
      }
      if buf.last() != Some(&b'\n') {
        tracing::debug!(bytes = n, "incomplete trailing line left for the next run");
        break;
      }
      run.read_offset += n as u64;
      report.lines_read += 1;

      let line = String::from_utf8_lossy(&buf);
      self.dispatch(&line, run, report).await?;

      if run.writer.should_flush() {
        self.flush(run, report).await?;
      }
    }

    self.flush(run, report).await
  }

  async fn dispatch(
    &self,
    line: &str,
    run: &mut Run,
    report: &mut IngestReport,
  ) -> Result<()> {
    let Some(record) = parse_line(line, run.dialect) else {
      report.lines_skipped += 1;
      return Ok(());
    };
    let now = Utc::now();

    if record.is_denied {
      tracing::debug!(
        identity = %record.identity,
        address = %record.address,
        logged_at = record.logged_at.as_deref(),
        "denied request"
      );
      run.writer.enqueue_denied(NewDenied::from_record(&record, now));
      return Ok(());
    }

    let key = record.user_key();
    let resolution = run
      .resolver
      .resolve(&self.store, &run.partition, &key)
      .await
      .map_err(Error::store)?;
    let user = match resolution {
      Resolution::Known(id) => UserRef::Known(id),
      Resolution::Pending => UserRef::Pending(key),
      Resolution::Enqueue => {
        run.writer.enqueue_user(key.clone(), now);
        UserRef::Pending(key)
      }
    };
    run.writer.enqueue_fact(NewFact::from_record(user, &record, now));
    Ok(())
  }

  async fn flush(&self, run: &mut Run, report: &mut IngestReport) -> Result<()> {
    let outcome = run
      .writer
      .flush(&self.store, &run.partition, &mut run.resolver)
      .await
      .map_err(Error::store)?;

    match outcome {
      FlushOutcome::Committed(receipt) => {
        report.absorb(&receipt);
        run.confirmed = run.read_offset;
        run.committed_any = true;
      }
      FlushOutcome::Discarded { users, facts, denied } => {
        report.batches_discarded += 1;
        tracing::error!(
          from = run.confirmed,
          to = run.read_offset,
          users,
          facts,
          denied,
          "batch discarded after repeated conflicts"
        );
      }
    }
    Ok(())
  }
}

// ─── File helpers ────────────────────────────────────────────────────────────

/// The first `limit` lines of `path`, decoded lossily.
async fn read_sample(path: &Path, limit: usize) -> std::io::Result<Vec<String>> {
  let mut reader = BufReader::new(File::open(path).await?);
  let mut sample = Vec::with_capacity(limit);
  let mut buf = Vec::new();

  while sample.len() < limit {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    sample.push(String::from_utf8_lossy(&buf).into_owned());
  }
  Ok(sample)
}

/// Open `path` and stat the opened handle, so the inode describes the bytes
/// that will be read even if the path is swapped meanwhile.
async fn open_with_identity(path: &Path) -> std::io::Result<(File, FileIdentity)> {
  let file = File::open(path).await?;
  let meta = file.metadata().await?;
  Ok((file, FileIdentity::from_metadata(&meta)))
}
