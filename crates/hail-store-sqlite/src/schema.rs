//! SQL schema for the Hail SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS rides (
    ride_id     TEXT PRIMARY KEY,
    rider_id    TEXT NOT NULL,
    driver_id   TEXT,            -- NULL until claimed; never reassigned
    status      TEXT NOT NULL
                CHECK (status IN
                  ('searching', 'in_progress', 'completed', 'canceled')),
    origin_lat  REAL NOT NULL,
    origin_lon  REAL NOT NULL,
    dest_lat    REAL NOT NULL,
    dest_lon    REAL NOT NULL,
    route_json  TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    updated_at  TEXT NOT NULL,
    CHECK ((driver_id IS NULL) = (status IN ('searching', 'canceled')))
);

-- Append-only audit trail, written in the same transaction as the change.
CREATE TABLE IF NOT EXISTS ride_transitions (
    transition_id TEXT PRIMARY KEY,
    ride_id       TEXT NOT NULL REFERENCES rides(ride_id),
    from_status   TEXT,          -- NULL for the creation record
    to_status     TEXT NOT NULL,
    actor_id      TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rides_status_idx ON rides(status);
CREATE INDEX IF NOT EXISTS ride_transitions_ride_idx
  ON ride_transitions(ride_id);

-- A terminal ride is frozen.
CREATE TRIGGER IF NOT EXISTS rides_terminal_frozen
BEFORE UPDATE ON rides
WHEN OLD.status IN ('completed', 'canceled')
BEGIN
    SELECT RAISE(ABORT, 'ride is in a terminal status');
END;

-- A driver, once assigned, stays assigned.
CREATE TRIGGER IF NOT EXISTS rides_driver_fixed
BEFORE UPDATE OF driver_id ON rides
WHEN OLD.driver_id IS NOT NULL AND NEW.driver_id IS NOT OLD.driver_id
BEGIN
    SELECT RAISE(ABORT, 'ride driver cannot be reassigned');
END;

CREATE TRIGGER IF NOT EXISTS ride_transitions_no_update
BEFORE UPDATE ON ride_transitions
BEGIN
    SELECT RAISE(ABORT, 'ride_transitions is append-only');
END;

CREATE TRIGGER IF NOT EXISTS ride_transitions_no_delete
BEFORE DELETE ON ride_transitions
BEGIN
    SELECT RAISE(ABORT, 'ride_transitions is append-only');
END;

PRAGMA user_version = 1;
";
