//! The route lookup collaborator, consulted once per ride at creation.

use std::future::Future;

use crate::ride::{Point, RoutePayload};

/// Computes a route between two points. Implemented outside this crate
/// (e.g. an OSRM HTTP client) and by test doubles.
pub trait RouteLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn route(
    &self,
    origin: Point,
    destination: Point,
  ) -> impl Future<Output = Result<RoutePayload, Self::Error>> + Send + '_;
}
