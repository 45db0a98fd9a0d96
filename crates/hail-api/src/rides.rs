//! Handlers for `/rides` endpoints.
//!
//! | Method | Path | Role | Notes |
//! |--------|------|------|-------|
//! | `POST` | `/rides` | rider | Body: `{"origin":{..},"destination":{..}}` |
//! | `GET`  | `/rides/searching` | driver | Oldest first |
//! | `GET`  | `/rides/{id}` | either | Rider or assigned driver only |
//! | `GET`  | `/rides/{id}/status` | either | Rider or assigned driver only |
//! | `GET`  | `/rides/{id}/history` | either | Rider or assigned driver only |
//! | `POST` | `/rides/{id}/claim` | driver | 409 if already claimed |
//! | `POST` | `/rides/{id}/complete` | driver | Assigned driver only |
//! | `POST` | `/rides/{id}/cancel` | rider | Only while searching |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use hail_core::{
  ride::{Point, Ride, RoutePayload, StatusView},
  route::RouteLookup,
  status::{RideStatus, Transition},
  store::RideStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, Driver, Rider},
  error::ApiError,
};

fn ride_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
  path
    .map(|Path(id)| id)
    .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// The short acknowledgement returned by every transition endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Transitioned {
  pub ride_id: Uuid,
  pub status:  RideStatus,
}

impl From<Ride> for Transitioned {
  fn from(ride: Ride) -> Self {
    Self {
      ride_id: ride.ride_id,
      status:  ride.status,
    }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub origin:      Point,
  pub destination: Point,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
  pub ride_id: Uuid,
  pub status:  RideStatus,
  pub route:   RoutePayload,
}

/// `POST /rides`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Rider(caller): Rider,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let ride = state
    .rides
    .create(&caller, body.origin, body.destination)
    .await?;
  Ok((
    StatusCode::CREATED,
    Json(Created {
      ride_id: ride.ride_id,
      status:  ride.status,
      route:   ride.route,
    }),
  ))
}

// ─── Driver pool ──────────────────────────────────────────────────────────────

/// `GET /rides/searching`
pub async fn searching<S, R>(
  State(state): State<AppState<S, R>>,
  Driver(_): Driver,
) -> Result<Json<Vec<Ride>>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  Ok(Json(state.rides.list_searching().await?))
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// `GET /rides/{id}`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Authenticated(caller): Authenticated,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Ride>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.get(&caller, id).await?))
}

/// `GET /rides/{id}/status`
pub async fn status<S, R>(
  State(state): State<AppState<S, R>>,
  Authenticated(caller): Authenticated,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StatusView>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.status(&caller, id).await?))
}

/// `GET /rides/{id}/history`
pub async fn history<S, R>(
  State(state): State<AppState<S, R>>,
  Authenticated(caller): Authenticated,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Transition>>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.history(&caller, id).await?))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// `POST /rides/{id}/claim`
pub async fn claim<S, R>(
  State(state): State<AppState<S, R>>,
  Driver(caller): Driver,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Transitioned>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.claim(&caller, id).await?.into()))
}

/// `POST /rides/{id}/complete`
pub async fn complete<S, R>(
  State(state): State<AppState<S, R>>,
  Driver(caller): Driver,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Transitioned>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.complete(&caller, id).await?.into()))
}

/// `POST /rides/{id}/cancel`
pub async fn cancel<S, R>(
  State(state): State<AppState<S, R>>,
  Rider(caller): Rider,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Transitioned>, ApiError>
where
  S: RideStore + 'static,
  R: RouteLookup + 'static,
{
  let id = ride_id(path)?;
  Ok(Json(state.rides.cancel(&caller, id).await?.into()))
}
