//! Waitlist API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), wires the
//! configured stores and notifier into the orchestrator, and serves the
//! signup endpoint over HTTP.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use waitlist_core::waitlist::{OutagePolicy, Waitlist};
use waitlist_server::{AppState, ServerConfig};
use waitlist_store_json::JsonStore;

#[derive(Parser)]
#[command(author, version, about = "Trinity Engine waitlist API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let http = reqwest::Client::new();
  let primary = cfg.primary_store(&http)?;
  let fallback = JsonStore::new(&cfg.json_store_path);
  let notifier = cfg.notifier(&http)?;

  match (&primary, cfg.outage_policy) {
    (Some(_), _) => tracing::info!(
      project = cfg.firestore_project.as_deref(),
      "primary store: Firestore"
    ),
    (None, OutagePolicy::Degrade) => tracing::warn!(
      path = %cfg.json_store_path.display(),
      "no primary store configured, serving from the flat-file fallback"
    ),
    // load() rejects fail_closed without a primary.
    (None, OutagePolicy::FailClosed) => unreachable!(),
  }

  let state = AppState {
    waitlist: Arc::new(Waitlist::new(primary, fallback, notifier, cfg.outage_policy)),
  };

  let app = waitlist_server::router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}
