//! [`SqliteStore`] — the SQLite implementation of [`RideStore`].

use std::{
  path::Path,
  time::{Duration, Instant},
};

use hail_core::{
  ride::{NewRide, Ride},
  status::{RideEvent, RideStatus, Transition},
  store::RideStore,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RIDE_COLUMNS, RawRide, RawTransition, decode_status, encode_dt, encode_uuid,
    now,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hail ride store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. Several
/// stores (or processes) may open the same file; transitions stay exclusive
/// because each one holds SQLite's write lock from its first read to commit.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  op_timeout: Duration,
}

/// What a guarded transition decided while holding the write lock.
enum Outcome {
  Applied(RawRide),
  Missing,
  /// The precondition failed; carries the status that was found.
  Rejected(String),
  /// The deadline passed before commit; the transaction was rolled back.
  Expired,
}

impl SqliteStore {
  /// Upper bound on a single store operation unless configured otherwise.
  pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, Self::DEFAULT_TIMEOUT).await
  }

  /// Open a store whose operations give up after `op_timeout`.
  ///
  /// The timeout bounds both the wait for SQLite's write lock and the whole
  /// transition, measured from the moment the call is made. A transition that
  /// overruns is rolled back and reported as [`Error::Timeout`].
  pub async fn open_with_timeout(
    path: impl AsRef<Path>,
    op_timeout: Duration,
  ) -> Result<Self> {
    let conn  = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, op_timeout };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn  = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, op_timeout: Self::DEFAULT_TIMEOUT };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy = self.op_timeout;
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(|e| busy_as_timeout(e, None))?;
    Ok(())
  }

  /// Apply `event` to a ride as one atomic check-and-set.
  ///
  /// The status is read, checked against the state machine, updated and
  /// audited inside a single `BEGIN IMMEDIATE` transaction. Any early return
  /// drops the transaction, which rolls it back.
  async fn transition(
    &self,
    ride_id:   Uuid,
    event:     RideEvent,
    driver_id: Option<Uuid>,
  ) -> Result<Ride> {
    let deadline   = Instant::now() + self.op_timeout;
    let id_str     = encode_uuid(ride_id);
    let driver_str = driver_id.map(encode_uuid);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, String, Option<String>)> = tx
          .query_row(
            "SELECT status, rider_id, driver_id FROM rides WHERE ride_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let Some((status, rider_id, assigned)) = current else {
          return Ok(Outcome::Missing);
        };

        let Some(target) =
          RideStatus::parse(&status).and_then(|s| s.after(event))
        else {
          return Ok(Outcome::Rejected(status));
        };

        let at = encode_dt(now());
        let changed = tx.execute(
          "UPDATE rides
           SET status = ?1, driver_id = COALESCE(driver_id, ?2), updated_at = ?3
           WHERE ride_id = ?4 AND status = ?5",
          rusqlite::params![target.as_str(), driver_str, at, id_str, status],
        )?;
        if changed != 1 {
          return Ok(Outcome::Rejected(status));
        }

        let actor = match event {
          RideEvent::Cancel => rider_id,
          RideEvent::Claim | RideEvent::Complete => {
            driver_str.clone().or(assigned).unwrap_or(rider_id)
          }
        };

        tx.execute(
          "INSERT INTO ride_transitions
             (transition_id, ride_id, from_status, to_status,
              actor_id, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            encode_uuid(Uuid::new_v4()),
            id_str,
            status,
            target.as_str(),
            actor,
            at,
          ],
        )?;

        if Instant::now() >= deadline {
          return Ok(Outcome::Expired);
        }

        let raw = tx.query_row(
          &format!("SELECT {RIDE_COLUMNS} FROM rides WHERE ride_id = ?1"),
          rusqlite::params![id_str],
          RawRide::from_row,
        )?;

        tx.commit()?;
        Ok(Outcome::Applied(raw))
      })
      .await
      .map_err(|e| busy_as_timeout(e, Some(ride_id)))?;

    match outcome {
      Outcome::Applied(raw) => raw.into_ride(),
      Outcome::Missing => Err(Error::RideNotFound(ride_id)),
      Outcome::Rejected(status) => Err(Error::Conflict {
        ride_id,
        status: decode_status(&status)?,
        event,
      }),
      Outcome::Expired => {
        tracing::warn!(
          %ride_id,
          %event,
          "transition overran its deadline; rolled back"
        );
        Err(Error::Timeout(Some(ride_id)))
      }
    }
  }
}

/// Failing to take the database lock within the busy timeout is a timeout,
/// not a generic database failure.
fn busy_as_timeout(e: tokio_rusqlite::Error, ride_id: Option<Uuid>) -> Error {
  match &e {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if f.code == rusqlite::ErrorCode::DatabaseBusy =>
    {
      Error::Timeout(ride_id)
    }
    _ => Error::Database(e),
  }
}

// ─── RideStore impl ──────────────────────────────────────────────────────────

impl RideStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create(&self, input: NewRide) -> Result<Ride> {
    let at = now();
    let ride = Ride {
      ride_id:     Uuid::new_v4(),
      rider_id:    input.rider_id,
      driver_id:   None,
      status:      RideStatus::Searching,
      origin:      input.origin,
      destination: input.destination,
      route:       input.route,
      created_at:  at,
      updated_at:  at,
    };

    let id_str       = encode_uuid(ride.ride_id);
    let rider_str    = encode_uuid(ride.rider_id);
    let status_str   = ride.status.as_str();
    let route_json   = serde_json::to_string(&ride.route)?;
    let at_str       = encode_dt(at);
    let (olat, olon) = (ride.origin.lat, ride.origin.lon);
    let (dlat, dlon) = (ride.destination.lat, ride.destination.lon);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO rides (
             ride_id, rider_id, status,
             origin_lat, origin_lon, dest_lat, dest_lon,
             route_json, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            id_str, rider_str, status_str, olat, olon, dlat, dlon, route_json,
            at_str,
          ],
        )?;
        tx.execute(
          "INSERT INTO ride_transitions
             (transition_id, ride_id, from_status, to_status,
              actor_id, recorded_at)
           VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(Uuid::new_v4()),
            id_str,
            status_str,
            rider_str,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| busy_as_timeout(e, Some(ride.ride_id)))?;

    Ok(ride)
  }

  async fn claim(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride> {
    self.transition(ride_id, RideEvent::Claim, Some(driver_id)).await
  }

  async fn complete(&self, ride_id: Uuid) -> Result<Ride> {
    self.transition(ride_id, RideEvent::Complete, None).await
  }

  async fn cancel(&self, ride_id: Uuid) -> Result<Ride> {
    self.transition(ride_id, RideEvent::Cancel, None).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_ride(&self, ride_id: Uuid) -> Result<Ride> {
    let id_str = encode_uuid(ride_id);

    let raw: Option<RawRide> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RIDE_COLUMNS} FROM rides WHERE ride_id = ?1"),
              rusqlite::params![id_str],
              RawRide::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(|e| busy_as_timeout(e, Some(ride_id)))?;

    raw.ok_or(Error::RideNotFound(ride_id))?.into_ride()
  }

  async fn get_status(&self, ride_id: Uuid) -> Result<RideStatus> {
    let id_str = encode_uuid(ride_id);

    let status: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT status FROM rides WHERE ride_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(|e| busy_as_timeout(e, Some(ride_id)))?;

    decode_status(&status.ok_or(Error::RideNotFound(ride_id))?)
  }

  async fn list_searching(&self) -> Result<Vec<Ride>> {
    let raws: Vec<RawRide> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RIDE_COLUMNS} FROM rides
           WHERE status = ?1
           ORDER BY created_at, ride_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![RideStatus::Searching.as_str()],
            RawRide::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(|e| busy_as_timeout(e, None))?;

    raws.into_iter().map(RawRide::into_ride).collect()
  }

  async fn history(&self, ride_id: Uuid) -> Result<Vec<Transition>> {
    let id_str = encode_uuid(ride_id);

    let raws: Option<Vec<RawTransition>> = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM rides WHERE ride_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if !exists {
          return Ok(None);
        }

        let mut stmt = conn.prepare(
          "SELECT transition_id, ride_id, from_status, to_status,
                  actor_id, recorded_at
           FROM ride_transitions
           WHERE ride_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawTransition {
              transition_id: row.get(0)?,
              ride_id:       row.get(1)?,
              from_status:   row.get(2)?,
              to_status:     row.get(3)?,
              actor_id:      row.get(4)?,
              recorded_at:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(rows))
      })
      .await
      .map_err(|e| busy_as_timeout(e, Some(ride_id)))?;

    raws
      .ok_or(Error::RideNotFound(ride_id))?
      .into_iter()
      .map(RawTransition::into_transition)
      .collect()
  }
}
