//! One-shot migration of the flat-file waitlist into Firestore.
//!
//! Safe to re-run: records already present in Firestore are skipped.
//!
//! ```
//! cargo run -p waitlist-server --bin migrate -- --config config.toml
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use waitlist_core::{migrate::migrate, store::SignupStore as _};
use waitlist_gcp::FirestoreStore;
use waitlist_server::ServerConfig;
use waitlist_store_json::JsonStore;

#[derive(Parser)]
#[command(author, version, about = "Migrate flat-file waitlist records into Firestore")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Flat file to migrate from; defaults to the configured fallback store.
  #[arg(long)]
  json_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let json_path = cli.json_path.unwrap_or_else(|| cfg.json_store_path.clone());

  // Strict read: a missing file means nothing to migrate, but a file that is
  // not a record array aborts the run.
  let records = JsonStore::read_strict(&json_path)
    .await
    .with_context(|| format!("cannot read {}", json_path.display()))?;

  if records.is_empty() {
    println!("Nothing to migrate in {}.", json_path.display());
    return Ok(());
  }

  let project = cfg
    .firestore_project
    .as_deref()
    .context("firestore_project must be configured to migrate")?;

  let http = reqwest::Client::new();
  let token = cfg.token_provider(&http)?;
  let dest = FirestoreStore::new(project, http, token);

  println!("Migrating {} records from {}...", records.len(), json_path.display());
  let report = migrate(&records, &dest).await?;
  println!(
    "Done: {} migrated, {} skipped (already present or blank).",
    report.migrated, report.skipped
  );

  match dest.count().await {
    Ok(total) => println!("Total records in Firestore: {total}"),
    Err(error) => tracing::warn!(%error, "could not read back the Firestore count"),
  }

  Ok(())
}
