//! The ride state machine and its audit records.
//!
//! ```text
//! Searching ──claim──▶ InProgress ──complete──▶ Completed
//!     │
//!     └──────cancel──▶ Canceled
//! ```
//!
//! `Completed` and `Canceled` are terminal. There is no path from
//! `InProgress` to `Canceled`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
  /// Waiting in the open pool for a driver.
  Searching,
  InProgress,
  Completed,
  Canceled,
}

impl RideStatus {
  /// The string stored in the `status` column and used on the wire.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Searching => "searching",
      Self::InProgress => "in_progress",
      Self::Completed => "completed",
      Self::Canceled => "canceled",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "searching" => Some(Self::Searching),
      "in_progress" => Some(Self::InProgress),
      "completed" => Some(Self::Completed),
      "canceled" => Some(Self::Canceled),
      _ => None,
    }
  }

  /// Whether a ride in this status must carry a driver assignment.
  pub fn has_driver(&self) -> bool {
    matches!(self, Self::InProgress | Self::Completed)
  }

  /// The status reached by applying `event`, or `None` if the guard fails.
  pub fn after(self, event: RideEvent) -> Option<Self> {
    (self == event.source()).then_some(event.target())
  }
}

impl fmt::Display for RideStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// A state-changing intent against an existing ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideEvent {
  Claim,
  Complete,
  Cancel,
}

impl RideEvent {
  /// The only status from which this event may be applied.
  pub fn source(&self) -> RideStatus {
    match self {
      Self::Claim | Self::Cancel => RideStatus::Searching,
      Self::Complete => RideStatus::InProgress,
    }
  }

  pub fn target(&self) -> RideStatus {
    match self {
      Self::Claim => RideStatus::InProgress,
      Self::Complete => RideStatus::Completed,
      Self::Cancel => RideStatus::Canceled,
    }
  }
}

impl fmt::Display for RideEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Claim => "claim",
      Self::Complete => "complete",
      Self::Cancel => "cancel",
    })
  }
}

// ─── Audit record ────────────────────────────────────────────────────────────

/// One applied status change. Written in the same transaction as the change
/// itself and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
  pub transition_id: Uuid,
  pub ride_id:       Uuid,
  /// `None` for the record written at creation.
  pub from:          Option<RideStatus>,
  pub to:            RideStatus,
  /// The rider or driver whose intent caused the change.
  pub actor_id:      Uuid,
  pub recorded_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [RideStatus; 4] = [
    RideStatus::Searching,
    RideStatus::InProgress,
    RideStatus::Completed,
    RideStatus::Canceled,
  ];

  const EVENTS: [RideEvent; 3] =
    [RideEvent::Claim, RideEvent::Complete, RideEvent::Cancel];

  #[test]
  fn allowed_transitions() {
    assert_eq!(
      RideStatus::Searching.after(RideEvent::Claim),
      Some(RideStatus::InProgress)
    );
    assert_eq!(
      RideStatus::InProgress.after(RideEvent::Complete),
      Some(RideStatus::Completed)
    );
    assert_eq!(
      RideStatus::Searching.after(RideEvent::Cancel),
      Some(RideStatus::Canceled)
    );
  }

  #[test]
  fn in_progress_cannot_be_canceled() {
    assert_eq!(RideStatus::InProgress.after(RideEvent::Cancel), None);
  }

  #[test]
  fn terminal_states_accept_nothing() {
    for status in [RideStatus::Completed, RideStatus::Canceled] {
      for event in EVENTS {
        assert_eq!(status.after(event), None, "{status} accepted {event}");
      }
    }
  }

  #[test]
  fn no_event_reenters_a_state() {
    for status in ALL {
      for event in EVENTS {
        if let Some(next) = status.after(event) {
          assert_ne!(next, status);
          assert_ne!(next, RideStatus::Searching);
        }
      }
    }
  }

  #[test]
  fn each_event_has_exactly_one_source() {
    for event in EVENTS {
      let sources: Vec<_> =
        ALL.into_iter().filter(|s| s.after(event).is_some()).collect();
      assert_eq!(sources, [event.source()]);
      assert_eq!(event.source().after(event), Some(event.target()));
    }
  }

  #[test]
  fn driver_presence_follows_status() {
    assert!(!RideStatus::Searching.has_driver());
    assert!(RideStatus::InProgress.has_driver());
    assert!(RideStatus::Completed.has_driver());
    assert!(!RideStatus::Canceled.has_driver());
  }

  #[test]
  fn as_str_matches_serde() {
    for status in ALL {
      let json = serde_json::to_value(status).unwrap();
      assert_eq!(json, serde_json::Value::String(status.as_str().into()));
      assert_eq!(RideStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(RideStatus::parse("SEARCHING"), None);
  }
}
