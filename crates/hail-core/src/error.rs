//! Error types for `hail-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::status::{RideEvent, RideStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("ride not found: {0}")]
  RideNotFound(Uuid),

  /// The ride was no longer in the status the event requires.
  #[error("ride {ride_id} is {status}; cannot {event}")]
  Conflict {
    ride_id: Uuid,
    status:  RideStatus,
    event:   RideEvent,
  },

  #[error("caller {caller} may not {action} ride {ride_id}")]
  Forbidden {
    ride_id: Uuid,
    caller:  Uuid,
    action:  &'static str,
  },

  #[error("invalid point: {0}")]
  InvalidPoint(String),

  #[error("route lookup failed: {0}")]
  RouteLookup(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The store gave up waiting for its lock or overran its deadline.
  #[error("store operation{} timed out", on_ride(.0))]
  Timeout(Option<Uuid>),
}

/// Coarse classification of an [`Error`], used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Forbidden,
  Invalid,
  /// Route lookup or storage failure; the caller did nothing wrong.
  Upstream,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::RideNotFound(_) => ErrorKind::NotFound,
      Self::Conflict { .. } => ErrorKind::Conflict,
      Self::Forbidden { .. } => ErrorKind::Forbidden,
      Self::InvalidPoint(_) => ErrorKind::Invalid,
      Self::RouteLookup(_) | Self::Storage(_) | Self::Timeout(_) => {
        ErrorKind::Upstream
      }
    }
  }
}

fn on_ride(ride_id: &Option<Uuid>) -> String {
  ride_id.map(|id| format!(" on ride {id}")).unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
