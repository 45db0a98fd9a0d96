//! [`RideLifecycle`] — authorization and orchestration for ride intents.
//!
//! The manager is stateless: every call re-reads the ride from the store,
//! checks that the caller may act on it, and asks the store to apply the
//! transition. Conflicts reported by the store are returned unchanged; retry
//! policy belongs to the caller.
//!
//! Role gating (only drivers claim, only riders create) happens where the
//! caller's credential is verified. This type only checks ownership.

use uuid::Uuid;

use crate::{
  Error, Result,
  identity::Caller,
  ride::{NewRide, Point, Ride, StatusView},
  route::RouteLookup,
  status::Transition,
  store::RideStore,
};

fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

/// Orchestrates ride intents over a [`RideStore`] and a [`RouteLookup`].
pub struct RideLifecycle<S, R> {
  store:  S,
  routes: R,
}

impl<S, R> RideLifecycle<S, R>
where
  S: RideStore,
  R: RouteLookup,
{
  pub fn new(store: S, routes: R) -> Self { Self { store, routes } }

  pub fn store(&self) -> &S { &self.store }

  // ── Rider intents ─────────────────────────────────────────────────────

  /// Request a ride from `origin` to `destination` on behalf of `caller`.
  ///
  /// The route is looked up once, before anything is written; a lookup
  /// failure leaves the store untouched.
  pub async fn create(
    &self,
    caller: &Caller,
    origin: Point,
    destination: Point,
  ) -> Result<Ride> {
    origin.validate()?;
    destination.validate()?;

    let route = self
      .routes
      .route(origin, destination)
      .await
      .map_err(|e| {
        tracing::warn!(
          rider_id = %caller.id,
          error = %e,
          "route lookup failed"
        );
        Error::RouteLookup(Box::new(e))
      })?;

    let ride = self
      .store
      .create(NewRide {
        rider_id: caller.id,
        origin,
        destination,
        route,
      })
      .await
      .map_err(store_err)?;

    tracing::info!(
      ride_id = %ride.ride_id,
      rider_id = %caller.id,
      "ride created"
    );
    Ok(ride)
  }

  /// Cancel a ride that is still searching. Only its rider may do this.
  pub async fn cancel(&self, caller: &Caller, ride_id: Uuid) -> Result<Ride> {
    let ride = self.store.get_ride(ride_id).await.map_err(store_err)?;
    if ride.rider_id != caller.id {
      return Err(forbidden(ride_id, caller, "cancel"));
    }

    let ride = self
      .store
      .cancel(ride_id)
      .await
      .map_err(store_err)
      .inspect_err(|e| rejected(ride_id, caller, e))?;

    tracing::info!(%ride_id, rider_id = %caller.id, "rider canceled ride");
    Ok(ride)
  }

  // ── Driver intents ────────────────────────────────────────────────────

  /// Claim a searching ride for `caller`. No ownership is required; the
  /// store decides the winner among concurrent claimants.
  pub async fn claim(&self, caller: &Caller, ride_id: Uuid) -> Result<Ride> {
    let ride = self
      .store
      .claim(ride_id, caller.id)
      .await
      .map_err(store_err)
      .inspect_err(|e| rejected(ride_id, caller, e))?;

    tracing::info!(%ride_id, driver_id = %caller.id, "driver claimed ride");
    Ok(ride)
  }

  /// Complete a ride. Only the assigned driver may do this.
  pub async fn complete(&self, caller: &Caller, ride_id: Uuid) -> Result<Ride> {
    let ride = self.store.get_ride(ride_id).await.map_err(store_err)?;
    if ride.driver_id != Some(caller.id) {
      return Err(forbidden(ride_id, caller, "complete"));
    }

    let ride = self
      .store
      .complete(ride_id)
      .await
      .map_err(store_err)
      .inspect_err(|e| rejected(ride_id, caller, e))?;

    tracing::info!(%ride_id, driver_id = %caller.id, "driver completed ride");
    Ok(ride)
  }

  /// The open pool. Unbounded; see [`RideStore::list_searching`].
  pub async fn list_searching(&self) -> Result<Vec<Ride>> {
    self.store.list_searching().await.map_err(store_err)
  }

  // ── Queries ───────────────────────────────────────────────────────────

  /// The full ride record, visible to its rider and its assigned driver.
  pub async fn get(&self, caller: &Caller, ride_id: Uuid) -> Result<Ride> {
    self.visible_ride(caller, ride_id).await
  }

  pub async fn status(
    &self,
    caller: &Caller,
    ride_id: Uuid,
  ) -> Result<StatusView> {
    Ok(self.visible_ride(caller, ride_id).await?.status_view())
  }

  pub async fn history(
    &self,
    caller: &Caller,
    ride_id: Uuid,
  ) -> Result<Vec<Transition>> {
    self.visible_ride(caller, ride_id).await?;
    self.store.history(ride_id).await.map_err(store_err)
  }

  async fn visible_ride(&self, caller: &Caller, ride_id: Uuid) -> Result<Ride> {
    let ride = self.store.get_ride(ride_id).await.map_err(store_err)?;
    if ride.rider_id == caller.id || ride.driver_id == Some(caller.id) {
      Ok(ride)
    } else {
      Err(forbidden(ride_id, caller, "view"))
    }
  }
}

fn forbidden(ride_id: Uuid, caller: &Caller, action: &'static str) -> Error {
  tracing::debug!(%ride_id, caller = %caller.id, action, "forbidden");
  Error::Forbidden {
    ride_id,
    caller: caller.id,
    action,
  }
}

fn rejected(ride_id: Uuid, caller: &Caller, error: &Error) {
  tracing::debug!(%ride_id, caller = %caller.id, %error, "transition rejected");
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
  };

  use chrono::Utc;

  use super::*;
  use crate::{
    ErrorKind,
    ride::RoutePayload,
    status::{RideEvent, RideStatus},
  };

  // A mutex-guarded map standing in for a real backend.
  #[derive(Default)]
  struct MemoryStore {
    rides:       Mutex<HashMap<Uuid, Ride>>,
    transitions: Mutex<Vec<Transition>>,
  }

  impl MemoryStore {
    fn apply(
      &self,
      ride_id: Uuid,
      event: RideEvent,
      driver_id: Option<Uuid>,
    ) -> Result<Ride> {
      let mut rides = self.rides.lock().unwrap();
      let ride = rides.get_mut(&ride_id).ok_or(Error::RideNotFound(ride_id))?;
      let from = ride.status;
      let to = from.after(event).ok_or(Error::Conflict {
        ride_id,
        status: from,
        event,
      })?;
      if let Some(d) = driver_id {
        ride.driver_id = Some(d);
      }
      ride.status = to;
      ride.updated_at = Utc::now();
      self.transitions.lock().unwrap().push(Transition {
        transition_id: Uuid::new_v4(),
        ride_id,
        from: Some(from),
        to,
        actor_id: match event {
          RideEvent::Cancel => ride.rider_id,
          _ => ride.driver_id.unwrap_or(ride.rider_id),
        },
        recorded_at: ride.updated_at,
      });
      Ok(ride.clone())
    }
  }

  impl RideStore for MemoryStore {
    type Error = Error;

    async fn create(&self, input: NewRide) -> Result<Ride> {
      let now = Utc::now();
      let ride = Ride {
        ride_id:     Uuid::new_v4(),
        rider_id:    input.rider_id,
        driver_id:   None,
        status:      RideStatus::Searching,
        origin:      input.origin,
        destination: input.destination,
        route:       input.route,
        created_at:  now,
        updated_at:  now,
      };
      self.rides.lock().unwrap().insert(ride.ride_id, ride.clone());
      Ok(ride)
    }

    async fn claim(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride> {
      self.apply(ride_id, RideEvent::Claim, Some(driver_id))
    }

    async fn complete(&self, ride_id: Uuid) -> Result<Ride> {
      self.apply(ride_id, RideEvent::Complete, None)
    }

    async fn cancel(&self, ride_id: Uuid) -> Result<Ride> {
      self.apply(ride_id, RideEvent::Cancel, None)
    }

    async fn get_ride(&self, ride_id: Uuid) -> Result<Ride> {
      self
        .rides
        .lock()
        .unwrap()
        .get(&ride_id)
        .cloned()
        .ok_or(Error::RideNotFound(ride_id))
    }

    async fn get_status(&self, ride_id: Uuid) -> Result<RideStatus> {
      Ok(self.get_ride(ride_id).await?.status)
    }

    async fn list_searching(&self) -> Result<Vec<Ride>> {
      Ok(
        self
          .rides
          .lock()
          .unwrap()
          .values()
          .filter(|r| r.status == RideStatus::Searching)
          .cloned()
          .collect(),
      )
    }

    async fn history(&self, ride_id: Uuid) -> Result<Vec<Transition>> {
      Ok(
        self
          .transitions
          .lock()
          .unwrap()
          .iter()
          .filter(|t| t.ride_id == ride_id)
          .cloned()
          .collect(),
      )
    }
  }

  #[derive(Debug, thiserror::Error)]
  #[error("no route between the given points")]
  struct NoRoute;

  #[derive(Default)]
  struct StubRoutes {
    fail:  bool,
    calls: AtomicUsize,
  }

  impl RouteLookup for StubRoutes {
    type Error = NoRoute;

    async fn route(
      &self,
      _origin: Point,
      _destination: Point,
    ) -> Result<RoutePayload, NoRoute> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(NoRoute);
      }
      Ok(RoutePayload(serde_json::json!({ "type": "LineString" })))
    }
  }

  fn manager() -> RideLifecycle<MemoryStore, StubRoutes> {
    RideLifecycle::new(MemoryStore::default(), StubRoutes::default())
  }

  fn dushanbe() -> (Point, Point) {
    (Point::new(38.5598, 68.7870), Point::new(38.5737, 68.7738))
  }

  async fn searching_ride(
    m: &RideLifecycle<MemoryStore, StubRoutes>,
    rider: &Caller,
  ) -> Ride {
    let (a, b) = dushanbe();
    m.create(rider, a, b).await.unwrap()
  }

  // ── Create ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_assigns_caller_as_rider() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());

    let ride = searching_ride(&m, &rider).await;
    assert_eq!(ride.rider_id, rider.id);
    assert_eq!(ride.status, RideStatus::Searching);
    assert_eq!(ride.driver_id, None);
    assert_eq!(m.routes.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn create_rejects_bad_point_before_lookup() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());

    let err = m
      .create(&rider, Point::new(91.0, 0.0), Point::new(0.0, 0.0))
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(m.routes.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn route_failure_stores_nothing() {
    let m = RideLifecycle::new(
      MemoryStore::default(),
      StubRoutes {
        fail: true,
        ..Default::default()
      },
    );
    let (a, b) = dushanbe();

    let err = m.create(&Caller::rider(Uuid::new_v4()), a, b).await.unwrap_err();
    assert!(matches!(err, Error::RouteLookup(_)));
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(m.list_searching().await.unwrap().is_empty());
  }

  // ── Authorization ───────────────────────────────────────────────────────────

  async fn assert_hidden(
    m: &RideLifecycle<MemoryStore, StubRoutes>,
    stranger: &Caller,
    id: Uuid,
  ) {
    let forbidden = ErrorKind::Forbidden;
    assert_eq!(m.get(stranger, id).await.unwrap_err().kind(), forbidden);
    assert_eq!(m.status(stranger, id).await.unwrap_err().kind(), forbidden);
    assert_eq!(m.cancel(stranger, id).await.unwrap_err().kind(), forbidden);
  }

  #[tokio::test]
  async fn stranger_is_forbidden_in_every_status() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());
    let stranger = Caller::rider(Uuid::new_v4());
    let driver = Caller::driver(Uuid::new_v4());

    let ride = searching_ride(&m, &rider).await;
    let id = ride.ride_id;

    assert_hidden(&m, &stranger, id).await;
    m.claim(&driver, id).await.unwrap();
    assert_hidden(&m, &stranger, id).await;
    m.complete(&driver, id).await.unwrap();
    assert_hidden(&m, &stranger, id).await;

    let canceled = searching_ride(&m, &rider).await;
    m.cancel(&rider, canceled.ride_id).await.unwrap();
    assert_hidden(&m, &stranger, canceled.ride_id).await;
    assert_eq!(
      m.store().get_status(canceled.ride_id).await.unwrap(),
      RideStatus::Canceled
    );

    assert_eq!(
      m.store().get_status(id).await.unwrap(),
      RideStatus::Completed
    );
  }

  #[tokio::test]
  async fn forbidden_cancel_leaves_ride_searching() {
    let m = manager();
    let ride = searching_ride(&m, &Caller::rider(Uuid::new_v4())).await;

    let err = m
      .cancel(&Caller::rider(Uuid::new_v4()), ride.ride_id)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Forbidden { action: "cancel", .. }));
    assert_eq!(
      m.store().get_status(ride.ride_id).await.unwrap(),
      RideStatus::Searching
    );
  }

  #[tokio::test]
  async fn assigned_driver_can_view_but_not_cancel() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());
    let driver = Caller::driver(Uuid::new_v4());
    let ride = searching_ride(&m, &rider).await;

    m.claim(&driver, ride.ride_id).await.unwrap();

    let view = m.status(&driver, ride.ride_id).await.unwrap();
    assert_eq!(view.status, RideStatus::InProgress);
    assert_eq!(view.driver_id, Some(driver.id));
    assert!(m.get(&driver, ride.ride_id).await.is_ok());
    assert_eq!(
      m.cancel(&driver, ride.ride_id).await.unwrap_err().kind(),
      ErrorKind::Forbidden
    );
  }

  #[tokio::test]
  async fn only_assignee_completes() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());
    let d1 = Caller::driver(Uuid::new_v4());
    let d2 = Caller::driver(Uuid::new_v4());
    let ride = searching_ride(&m, &rider).await;

    m.claim(&d1, ride.ride_id).await.unwrap();

    let err = m.complete(&d2, ride.ride_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let done = m.complete(&d1, ride.ride_id).await.unwrap();
    assert_eq!(done.status, RideStatus::Completed);
    assert_eq!(done.driver_id, Some(d1.id));
  }

  #[tokio::test]
  async fn unclaimed_ride_has_no_assignee() {
    let m = manager();
    let ride = searching_ride(&m, &Caller::rider(Uuid::new_v4())).await;

    let err = m
      .complete(&Caller::driver(Uuid::new_v4()), ride.ride_id)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
  }

  // ── Conflicts ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn second_complete_conflicts() {
    let m = manager();
    let driver = Caller::driver(Uuid::new_v4());
    let ride = searching_ride(&m, &Caller::rider(Uuid::new_v4())).await;
    m.claim(&driver, ride.ride_id).await.unwrap();

    let first = m.complete(&driver, ride.ride_id).await.unwrap();
    let err = m.complete(&driver, ride.ride_id).await.unwrap_err();
    assert!(matches!(
      err,
      Error::Conflict {
        status: RideStatus::Completed,
        event: RideEvent::Complete,
        ..
      }
    ));

    let after = m.store().get_ride(ride.ride_id).await.unwrap();
    assert_eq!(after.updated_at, first.updated_at);
    assert_eq!(after.status, RideStatus::Completed);
  }

  #[tokio::test]
  async fn claim_after_cancel_conflicts() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());
    let ride = searching_ride(&m, &rider).await;

    let canceled = m.cancel(&rider, ride.ride_id).await.unwrap();
    assert_eq!(canceled.status, RideStatus::Canceled);

    let err = m
      .claim(&Caller::driver(Uuid::new_v4()), ride.ride_id)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
  }

  #[tokio::test]
  async fn unknown_ride_is_not_found() {
    let m = manager();
    let caller = Caller::driver(Uuid::new_v4());
    let id = Uuid::new_v4();

    let missing = ErrorKind::NotFound;
    assert_eq!(m.claim(&caller, id).await.unwrap_err().kind(), missing);
    assert_eq!(m.get(&caller, id).await.unwrap_err().kind(), missing);
    assert_eq!(m.complete(&caller, id).await.unwrap_err().kind(), missing);
  }

  #[tokio::test]
  async fn history_requires_visibility() {
    let m = manager();
    let rider = Caller::rider(Uuid::new_v4());
    let driver = Caller::driver(Uuid::new_v4());
    let ride = searching_ride(&m, &rider).await;
    m.claim(&driver, ride.ride_id).await.unwrap();

    let trail = m.history(&driver, ride.ride_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].to, RideStatus::InProgress);
    assert_eq!(trail[0].actor_id, driver.id);

    let err = m
      .history(&Caller::rider(Uuid::new_v4()), ride.ride_id)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
  }
}
