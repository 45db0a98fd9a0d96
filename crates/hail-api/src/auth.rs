//! Bearer-token identity: JWT verification, issuing, and axum extractors.
//!
//! A token carries the caller's id in `sub` and exactly one [`Role`]. The
//! extractors turn a verified token into a [`Caller`]; [`Rider`] and
//! [`Driver`] additionally reject callers acting in the other role.

use std::sync::Arc;

use axum::{
  extract::{FromRef, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use hail_core::identity::{Caller, Role};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// JWT claims understood by Hail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:  Uuid,
  pub role: Role,
  /// Expiry as seconds since the Unix epoch.
  pub exp:  i64,
}

/// Shared secret used to sign and verify tokens (HS256).
#[derive(Clone)]
pub struct AuthConfig {
  pub secret: String,
}

impl AuthConfig {
  pub fn new(secret: impl Into<String>) -> Self {
    Self {
      secret: secret.into(),
    }
  }
}

/// Sign a token for `caller` that expires after `ttl`.
pub fn issue_token(
  config: &AuthConfig,
  caller: Caller,
  ttl: Duration,
) -> Result<String, ApiError> {
  let claims = Claims {
    sub:  caller.id,
    role: caller.role,
    exp:  (Utc::now() + ttl).timestamp(),
  };
  let key = EncodingKey::from_secret(config.secret.as_bytes());
  Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
}

/// Verify the `Authorization: Bearer` header and return the caller it names.
pub fn verify_bearer(
  headers: &HeaderMap,
  config: &AuthConfig,
) -> Result<Caller, ApiError> {
  let token = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(ApiError::Unauthorized)?;

  let key = DecodingKey::from_secret(config.secret.as_bytes());
  let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
    .map_err(|e| {
      tracing::debug!(error = %e, "rejected bearer token");
      ApiError::Unauthorized
    })?;

  Ok(Caller {
    id:   data.claims.sub,
    role: data.claims.role,
  })
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// Any verified caller, in either role.
pub struct Authenticated(pub Caller);

/// A verified caller acting as a rider.
pub struct Rider(pub Caller);

/// A verified caller acting as a driver.
pub struct Driver(pub Caller);

fn require(caller: Caller, role: Role) -> Result<Caller, ApiError> {
  if caller.role == role {
    Ok(caller)
  } else {
    Err(ApiError::WrongRole(role))
  }
}

impl<St> FromRequestParts<St> for Authenticated
where
  Arc<AuthConfig>: FromRef<St>,
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &St,
  ) -> Result<Self, Self::Rejection> {
    let config = Arc::<AuthConfig>::from_ref(state);
    Ok(Authenticated(verify_bearer(&parts.headers, &config)?))
  }
}

impl<St> FromRequestParts<St> for Rider
where
  Arc<AuthConfig>: FromRef<St>,
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &St,
  ) -> Result<Self, Self::Rejection> {
    let Authenticated(caller) =
      Authenticated::from_request_parts(parts, state).await?;
    Ok(Rider(require(caller, Role::Rider)?))
  }
}

impl<St> FromRequestParts<St> for Driver
where
  Arc<AuthConfig>: FromRef<St>,
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &St,
  ) -> Result<Self, Self::Rejection> {
    let Authenticated(caller) =
      Authenticated::from_request_parts(parts, state).await?;
    Ok(Driver(require(caller, Role::Driver)?))
  }
}
