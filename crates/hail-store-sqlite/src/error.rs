//! Error type for `hail-store-sqlite`.

use hail_core::status::{RideEvent, RideStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown ride status: {0:?}")]
  UnknownStatus(String),

  /// A row whose driver assignment contradicts its status.
  #[error("ride {ride_id} is {status} but driver_id is {driver}")]
  DriverMismatch {
    ride_id: String,
    status:  RideStatus,
    driver:  &'static str,
  },

  #[error("ride not found: {0}")]
  RideNotFound(uuid::Uuid),

  /// The guarded precondition did not hold inside the transaction.
  #[error("ride {ride_id} is {status}; cannot {event}")]
  Conflict {
    ride_id: uuid::Uuid,
    status:  RideStatus,
    event:   RideEvent,
  },

  /// The transaction was rolled back because its deadline passed, or the
  /// database lock could not be taken within the busy timeout.
  #[error("store operation timed out")]
  Timeout(Option<uuid::Uuid>),
}

impl From<Error> for hail_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::RideNotFound(id) => hail_core::Error::RideNotFound(id),
      Error::Conflict {
        ride_id,
        status,
        event,
      } => hail_core::Error::Conflict {
        ride_id,
        status,
        event,
      },
      Error::Timeout(id) => hail_core::Error::Timeout(id),
      other => hail_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
