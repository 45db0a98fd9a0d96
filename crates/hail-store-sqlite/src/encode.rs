//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! so that lexical order equals chronological order. UUIDs are stored as
//! hyphenated lowercase strings. Route payloads are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use hail_core::{
  ride::{Point, Ride, RoutePayload},
  status::{RideStatus, Transition},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RideStatus ───────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<RideStatus> {
  RideStatus::parse(s).ok_or_else(|| Error::UnknownStatus(s.to_owned()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawRide::from_row`].
pub const RIDE_COLUMNS: &str = "ride_id, rider_id, driver_id, status, \
   origin_lat, origin_lon, dest_lat, dest_lon, route_json, \
   created_at, updated_at";

/// Raw values read directly from a `rides` row.
pub struct RawRide {
  pub ride_id:    String,
  pub rider_id:   String,
  pub driver_id:  Option<String>,
  pub status:     String,
  pub origin_lat: f64,
  pub origin_lon: f64,
  pub dest_lat:   f64,
  pub dest_lon:   f64,
  pub route_json: String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRide {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ride_id:    row.get(0)?,
      rider_id:   row.get(1)?,
      driver_id:  row.get(2)?,
      status:     row.get(3)?,
      origin_lat: row.get(4)?,
      origin_lon: row.get(5)?,
      dest_lat:   row.get(6)?,
      dest_lon:   row.get(7)?,
      route_json: row.get(8)?,
      created_at: row.get(9)?,
      updated_at: row.get(10)?,
    })
  }

  pub fn into_ride(self) -> Result<Ride> {
    let status = decode_status(&self.status)?;
    if status.has_driver() != self.driver_id.is_some() {
      return Err(Error::DriverMismatch {
        ride_id: self.ride_id,
        status,
        driver: if self.driver_id.is_some() { "set" } else { "missing" },
      });
    }

    Ok(Ride {
      ride_id:     decode_uuid(&self.ride_id)?,
      rider_id:    decode_uuid(&self.rider_id)?,
      driver_id:   self.driver_id.as_deref().map(decode_uuid).transpose()?,
      status,
      origin:      Point::new(self.origin_lat, self.origin_lon),
      destination: Point::new(self.dest_lat, self.dest_lon),
      route:       RoutePayload(serde_json::from_str(&self.route_json)?),
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `ride_transitions` row.
pub struct RawTransition {
  pub transition_id: String,
  pub ride_id:       String,
  pub from_status:   Option<String>,
  pub to_status:     String,
  pub actor_id:      String,
  pub recorded_at:   String,
}

impl RawTransition {
  pub fn into_transition(self) -> Result<Transition> {
    let from = self.from_status.as_deref().map(decode_status).transpose()?;
    Ok(Transition {
      transition_id: decode_uuid(&self.transition_id)?,
      ride_id:       decode_uuid(&self.ride_id)?,
      from,
      to:            decode_status(&self.to_status)?,
      actor_id:      decode_uuid(&self.actor_id)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}
