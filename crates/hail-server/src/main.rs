//! Hail server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `HAIL_*` environment variables, opens the SQLite ride store, and serves
//! the ride API over HTTP.
//!
//! # Development tokens
//!
//! Identity is normally issued elsewhere. To mint a token signed with the
//! configured secret:
//!
//! ```text
//! cargo run -p hail-server --bin server -- --mint-token \
//!   --subject 6f1c0a52-1d2e-4c3b-9a8f-0e4d5c6b7a81 --role driver
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use hail_api::{AppState, AuthConfig, auth::issue_token};
use hail_core::{
  RideLifecycle,
  identity::{Caller, Role},
};
use hail_server::{OsrmClient, ServerConfig};
use hail_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
  Rider,
  Driver,
}

impl From<RoleArg> for Role {
  fn from(r: RoleArg) -> Self {
    match r {
      RoleArg::Rider => Role::Rider,
      RoleArg::Driver => Role::Driver,
    }
  }
}

#[derive(Parser)]
#[command(author, version, about = "Hail ride coordination server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a bearer token for `--subject` in `--role` and exit.
  #[arg(long, requires_all = ["subject", "role"])]
  mint_token: bool,

  #[arg(long)]
  subject: Option<Uuid>,

  #[arg(long, value_enum)]
  role: Option<RoleArg>,

  /// Lifetime of a minted token, in hours.
  #[arg(long, default_value_t = 24)]
  ttl_hours: i64,
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
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("HAIL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let auth = AuthConfig::new(server_cfg.jwt_secret.clone());

  // Helper mode: mint a token and exit.
  if cli.mint_token {
    let (Some(id), Some(role)) = (cli.subject, cli.role) else {
      anyhow::bail!("--mint-token needs --subject and --role");
    };
    let caller = Caller { id, role: role.into() };
    let ttl = chrono::Duration::hours(cli.ttl_hours);
    let token =
      issue_token(&auth, caller, ttl).context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("failed to create {dir:?}"))?;
  }

  // Open SQLite store.
  let store =
    SqliteStore::open_with_timeout(&store_path, server_cfg.store_timeout())
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let routes =
    OsrmClient::new(server_cfg.osrm_url.clone(), server_cfg.route_timeout())
      .context("failed to build routing client")?;

  let state = AppState::new(RideLifecycle::new(store, routes), auth);
  let app = hail_server::app(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("server stopped");
  Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  tracing::info!("shutdown signal received; draining connections");
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
