//! JSON REST API for Hail.
//!
//! Exposes an axum [`Router`] over a [`RideLifecycle`], with callers
//! identified by HS256 bearer tokens. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = hail_api::api_router(AppState::new(lifecycle, auth));
//! ```

pub mod auth;
pub mod error;
pub mod rides;


use std::sync::Arc;

use axum::{
  Router,
  extract::FromRef,
  routing::{get, post},
};
use hail_core::{RideLifecycle, route::RouteLookup, store::RideStore};

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, R> {
  pub rides: Arc<RideLifecycle<S, R>>,
  pub auth:  Arc<AuthConfig>,
}

impl<S, R> AppState<S, R> {
  pub fn new(rides: RideLifecycle<S, R>, auth: AuthConfig) -> Self {
    Self {
      rides: Arc::new(rides),
      auth:  Arc::new(auth),
    }
  }
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self {
      rides: self.rides.clone(),
      auth:  self.auth.clone(),
    }
  }
}

impl<S, R> FromRef<AppState<S, R>> for Arc<AuthConfig> {
  fn from_ref(state: &AppState<S, R>) -> Self { state.auth.clone() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, R>(state: AppState<S, R>) -> Router<()>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  Router::new()
    .route("/rides", post(rides::create::<S, R>))
    .route("/rides/searching", get(rides::searching::<S, R>))
    .route("/rides/{id}", get(rides::get_one::<S, R>))
    .route("/rides/{id}/status", get(rides::status::<S, R>))
    .route("/rides/{id}/history", get(rides::history::<S, R>))
    .route("/rides/{id}/claim", post(rides::claim::<S, R>))
    .route("/rides/{id}/complete", post(rides::complete::<S, R>))
    .route("/rides/{id}/cancel", post(rides::cancel::<S, R>))
    .with_state(state)
}
