//! The `RideStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `hail-store-sqlite`).
//! Higher layers (`RideLifecycle`, `hail-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  ride::{NewRide, Ride},
  status::{RideStatus, Transition},
};

/// Abstraction over a durable ride store, the sole arbiter of ride state.
///
/// Every transition (`claim`, `complete`, `cancel`) must re-check its
/// precondition and apply the change atomically: under concurrent calls on
/// the same ride exactly one caller observes the precondition as true, and
/// the rest fail with a conflict. A failed call leaves the stored ride
/// unchanged.
///
/// Backend errors must convert into [`crate::Error`] so that missing rides
/// and conflicts reach callers as [`crate::ErrorKind::NotFound`] and
/// [`crate::ErrorKind::Conflict`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RideStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new ride in [`RideStatus::Searching`].
  fn create(
    &self,
    input: NewRide,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  /// Assign `driver_id` and move `Searching → InProgress`.
  fn claim(
    &self,
    ride_id: Uuid,
    driver_id: Uuid,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  /// Move `InProgress → Completed`.
  fn complete(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  /// Move `Searching → Canceled`.
  fn cancel(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_ride(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  fn get_status(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<RideStatus, Self::Error>> + Send + '_;

  /// Every ride currently awaiting a driver, as of the read.
  ///
  /// This is a full, unbounded scan of the open pool. Large fleets will
  /// need a paginated variant.
  fn list_searching(
    &self,
  ) -> impl Future<Output = Result<Vec<Ride>, Self::Error>> + Send + '_;

  /// The audit trail of a ride, oldest first.
  fn history(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Transition>, Self::Error>> + Send + '_;
}
