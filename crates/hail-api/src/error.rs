//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use hail_core::{ErrorKind, identity::Role};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No bearer credential, or one that fails verification.
  #[error("missing or invalid credentials")]
  Unauthorized,

  #[error("this endpoint requires the {0} role")]
  WrongRole(Role),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("could not issue token: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),

  #[error(transparent)]
  Ride(#[from] hail_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::WrongRole(_) => StatusCode::FORBIDDEN,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::Ride(e) => match (e.kind(), e) {
        (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
        (ErrorKind::Conflict, _) => StatusCode::CONFLICT,
        (ErrorKind::Forbidden, _) => StatusCode::FORBIDDEN,
        (ErrorKind::Invalid, _) => StatusCode::BAD_REQUEST,
        (ErrorKind::Upstream, hail_core::Error::RouteLookup(_)) => {
          StatusCode::BAD_GATEWAY
        }
        (ErrorKind::Upstream, hail_core::Error::Timeout(_)) => {
          StatusCode::GATEWAY_TIMEOUT
        }
        (ErrorKind::Upstream, _) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let mut res =
      (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"hail\""),
      );
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use hail_core::status::{RideEvent, RideStatus};
  use uuid::Uuid;

  use super::*;

  #[derive(Debug, Error)]
  #[error("boom")]
  struct Boom;

  #[test]
  fn ride_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
      (hail_core::Error::RideNotFound(id), StatusCode::NOT_FOUND),
      (
        hail_core::Error::Conflict {
          ride_id: id,
          status:  RideStatus::InProgress,
          event:   RideEvent::Claim,
        },
        StatusCode::CONFLICT,
      ),
      (
        hail_core::Error::Forbidden {
          ride_id: id,
          caller:  Uuid::new_v4(),
          action:  "cancel",
        },
        StatusCode::FORBIDDEN,
      ),
      (
        hail_core::Error::InvalidPoint("latitude 91".into()),
        StatusCode::BAD_REQUEST,
      ),
      (
        hail_core::Error::RouteLookup(Box::new(Boom)),
        StatusCode::BAD_GATEWAY,
      ),
      (
        hail_core::Error::Storage(Box::new(Boom)),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
      (hail_core::Error::Timeout(Some(id)), StatusCode::GATEWAY_TIMEOUT),
    ];

    for (err, expected) in cases {
      assert_eq!(ApiError::from(err).status(), expected);
    }
  }

  #[test]
  fn credential_errors() {
    assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      ApiError::WrongRole(Role::Driver).status(),
      StatusCode::FORBIDDEN
    );
  }
}
