//! dosewatch server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the reconcile and firing loops, and
//! serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use dosewatch_api::{ApiState, api_router};
use dosewatch_extract::GeminiExtractor;
use dosewatch_reminder::{
  JobScheduler, Reconciler, SystemClock, TwilioWhatsApp, spawn_firing_loop,
  spawn_reconcile_loop,
};
use dosewatch_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "dosewatch reminder server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Runtime server configuration, deserialised from `config.toml` with
/// `DOSEWATCH_*` environment overrides.
#[derive(Deserialize, Clone)]
struct ServerConfig {
  host:               String,
  port:               u16,
  store_path:         PathBuf,
  /// Seconds between reconcile ticks.
  #[serde(default = "default_tick_interval")]
  tick_interval_secs: u64,

  gemini_api_key:     String,
  #[serde(default = "default_gemini_model")]
  gemini_model:       String,

  twilio_account_sid: String,
  twilio_auth_token:  String,
  /// E.164 sender number, without the `whatsapp:` prefix.
  twilio_from_number: String,
}

fn default_tick_interval() -> u64 { 60 }

fn default_gemini_model() -> String { "gemini-1.5-flash".to_string() }

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
    .add_source(config::Environment::with_prefix("DOSEWATCH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Reminder subsystem: shared scheduler plus its two background loops.
  let scheduler = Arc::new(JobScheduler::new());
  let notifier = Arc::new(TwilioWhatsApp::new(
    server_cfg.twilio_account_sid.clone(),
    server_cfg.twilio_auth_token.clone(),
    server_cfg.twilio_from_number.clone(),
  ));
  let reconciler = Arc::new(Reconciler::new(
    Arc::clone(&store),
    Arc::clone(&scheduler),
    SystemClock,
  ));

  let firing = spawn_firing_loop(Arc::clone(&scheduler), notifier, SystemClock);
  let reconcile = spawn_reconcile_loop(
    reconciler,
    Duration::from_secs(server_cfg.tick_interval_secs),
  );

  // API router.
  let state = ApiState {
    store,
    scheduler,
    extractor: Arc::new(GeminiExtractor::new(
      server_cfg.gemini_api_key.clone(),
      server_cfg.gemini_model.clone(),
    )),
  };
  let app = axum::Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // Drain the background loops before exiting.
  reconcile.stop().await;
  firing.stop().await;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!("failed to install ctrl-c handler: {e}");
  }
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
