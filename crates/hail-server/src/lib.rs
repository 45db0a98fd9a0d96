//! HTTP server assembly for Hail.
//!
//! Wires the [`hail_api`] router to a SQLite store and an OSRM route client,
//! and carries the runtime configuration the `server` binary reads.

pub mod error;
pub mod osrm;

use std::{path::PathBuf, time::Duration};

use axum::Router;
use hail_api::{AppState, api_router};
use hail_core::{route::RouteLookup, store::RideStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::OsrmError;
pub use osrm::OsrmClient;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HAIL_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  pub store_path:       PathBuf,
  /// HS256 secret shared with the identity service.
  pub jwt_secret:       String,
  #[serde(default = "default_osrm_url")]
  pub osrm_url:         String,
  /// Upper bound on one store operation, including waiting for the lock.
  #[serde(default = "default_store_timeout_ms")]
  pub store_timeout_ms: u64,
  #[serde(default = "default_route_timeout_ms")]
  pub route_timeout_ms: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_osrm_url() -> String { osrm::DEFAULT_OSRM_URL.to_string() }
fn default_store_timeout_ms() -> u64 { 5_000 }
fn default_route_timeout_ms() -> u64 { 10_000 }

impl ServerConfig {
  pub fn store_timeout(&self) -> Duration {
    Duration::from_millis(self.store_timeout_ms)
  }

  pub fn route_timeout(&self) -> Duration {
    Duration::from_millis(self.route_timeout_ms)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the ride API with request tracing.
pub fn app<S, R>(state: AppState<S, R>) -> Router
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  api_router(state).layer(TraceLayer::new_for_http())
}
