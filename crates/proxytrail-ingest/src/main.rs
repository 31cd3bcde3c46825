//! ingestd: periodic access-log ingestion daemon.
//!
//! Reads `proxytrail.toml` (or the path given with `--config`), opens the
//! SQLite store and runs one ingestion pass every `interval_secs`. Runs never
//! overlap: each pass is awaited before the next tick is taken, and ticks
//! missed while a pass was running are skipped.
//!
//! ```
//! cargo run -p proxytrail-ingest --bin ingestd -- --once
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use proxytrail_ingest::{Ingester, Settings};
use proxytrail_store_sqlite::SqliteStore;
use tokio::time::MissedTickBehavior;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Proxy access-log ingestion daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "proxytrail.toml")]
  config: PathBuf,

  /// Run a single ingestion pass, print its report as JSON and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PROXYTRAIL"))
    .build()
    .context("failed to read config file")?;

  let mut settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise Settings")?;

  settings.store_path = expand_tilde(&settings.store_path);
  settings.log_path = expand_tilde(&settings.log_path);

  let store = SqliteStore::open(&settings.store_path, settings.busy_timeout())
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  let mut ingester = Ingester::new(store, settings.ingest_options());

  if cli.once {
    let report = ingester.ingest().await.context("ingestion run failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  let mut ticker = tokio::time::interval(settings.interval());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  tracing::info!(
    log = %settings.log_path.display(),
    store = %settings.store_path.display(),
    interval_secs = settings.interval().as_secs(),
    "ingestd started"
  );

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        // The scheduler logs and keeps ticking; the next pass resumes from
        // the last committed cursor.
        if let Err(e) = ingester.ingest().await {
          tracing::error!(error = %e, "scheduled ingestion failed");
        }
      }
      _ = tokio::signal::ctrl_c() => {
        tracing::info!("shutting down");
        break;
      }
    }
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
