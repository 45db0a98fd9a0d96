//! Ride types: the single mutable resource coordinated by Hail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, status::RideStatus};

// ─── Geography ───────────────────────────────────────────────────────────────

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub lat: f64,
  pub lon: f64,
}

impl Point {
  pub fn new(lat: f64, lon: f64) -> Self { Self { lat, lon } }

  /// Reject non-finite or out-of-range coordinates.
  pub fn validate(&self) -> Result<()> {
    if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
      return Err(Error::InvalidPoint(format!(
        "latitude {} outside [-90, 90]",
        self.lat
      )));
    }
    if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
      return Err(Error::InvalidPoint(format!(
        "longitude {} outside [-180, 180]",
        self.lon
      )));
    }
    Ok(())
  }
}

/// A precomputed path description, opaque to Hail. Stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutePayload(pub serde_json::Value);

// ─── Ride ────────────────────────────────────────────────────────────────────

/// A transport request from `origin` to `destination`.
///
/// Only `driver_id`, `status` and `updated_at` ever change, and only through
/// the store's guarded transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
  pub ride_id:     Uuid,
  pub rider_id:    Uuid,
  /// Set exactly once, by a successful claim.
  pub driver_id:   Option<Uuid>,
  pub status:      RideStatus,
  pub origin:      Point,
  pub destination: Point,
  pub route:       RoutePayload,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Ride {
  pub fn status_view(&self) -> StatusView {
    StatusView {
      ride_id:   self.ride_id,
      status:    self.status,
      driver_id: self.driver_id,
    }
  }
}

/// Input to [`crate::store::RideStore::create`].
/// Identifiers and timestamps are always set by the store.
#[derive(Debug, Clone)]
pub struct NewRide {
  pub rider_id:    Uuid,
  pub origin:      Point,
  pub destination: Point,
  pub route:       RoutePayload,
}

/// The compact answer to "where is my ride at?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
  pub ride_id:   Uuid,
  pub status:    RideStatus,
  pub driver_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn valid_points() {
    assert!(Point::new(0.0, 0.0).validate().is_ok());
    assert!(Point::new(-90.0, 180.0).validate().is_ok());
    assert!(Point::new(38.5598, 68.7870).validate().is_ok());
  }

  #[test]
  fn out_of_range_points() {
    assert!(matches!(
      Point::new(90.5, 0.0).validate(),
      Err(Error::InvalidPoint(_))
    ));
    assert!(matches!(
      Point::new(0.0, -180.01).validate(),
      Err(Error::InvalidPoint(_))
    ));
  }

  #[test]
  fn non_finite_points() {
    assert!(Point::new(f64::NAN, 0.0).validate().is_err());
    assert!(Point::new(0.0, f64::INFINITY).validate().is_err());
  }

  #[test]
  fn route_payload_is_transparent() {
    let route = RoutePayload(serde_json::json!({ "type": "LineString" }));
    let json = serde_json::to_string(&route).unwrap();
    assert_eq!(json, r#"{"type":"LineString"}"#);
  }
}
