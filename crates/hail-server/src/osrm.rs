//! [`OsrmClient`] — route lookup against an OSRM-compatible HTTP service.

use std::time::Duration;

use hail_core::{
  ride::{Point, RoutePayload},
  route::RouteLookup,
};
use reqwest::Client;
use serde::Deserialize;

use crate::error::OsrmError;

/// Public demo server; fine for development, not for production traffic.
pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org";

/// Async client for the OSRM `route` service.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct OsrmClient {
  client:   Client,
  base_url: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
  code:    String,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  routes:  Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
  geometry: serde_json::Value,
}

impl OsrmClient {
  /// Build a client whose requests give up after `timeout`.
  pub fn new(
    base_url: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self, OsrmError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
    })
  }

  /// OSRM takes coordinates as `lon,lat`.
  fn url(&self, origin: Point, destination: Point) -> String {
    format!(
      "{}/route/v1/driving/{},{};{},{}?geometries=geojson",
      self.base_url.trim_end_matches('/'),
      origin.lon,
      origin.lat,
      destination.lon,
      destination.lat,
    )
  }
}

fn first_geometry(resp: RouteResponse) -> Result<RoutePayload, OsrmError> {
  if resp.code != "Ok" {
    return Err(OsrmError::Code {
      message: resp.message.unwrap_or_default(),
      code:    resp.code,
    });
  }
  resp
    .routes
    .into_iter()
    .next()
    .map(|r| RoutePayload(r.geometry))
    .ok_or(OsrmError::NoRoutes)
}

impl RouteLookup for OsrmClient {
  type Error = OsrmError;

  async fn route(
    &self,
    origin: Point,
    destination: Point,
  ) -> Result<RoutePayload, OsrmError> {
    let url = self.url(origin, destination);
    tracing::debug!(%url, "requesting route");

    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(OsrmError::Status(resp.status()));
    }
    first_geometry(resp.json().await?)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  fn parse(v: Value) -> RouteResponse { serde_json::from_value(v).unwrap() }

  #[test]
  fn url_puts_longitude_first() {
    let client =
      OsrmClient::new("http://osrm.local/", Duration::from_secs(1)).unwrap();
    let url = client.url(Point::new(38.5, 68.7), Point::new(38.6, 68.8));
    assert_eq!(
      url,
      "http://osrm.local/route/v1/driving/68.7,38.5;68.8,38.6?geometries=geojson"
    );
  }

  #[test]
  fn takes_first_route_geometry() {
    let resp = parse(json!({
      "code": "Ok",
      "routes": [
        {
          "geometry": { "type": "LineString", "coordinates": [[1, 2], [3, 4]] },
        },
        { "geometry": { "type": "LineString", "coordinates": [] } },
      ],
    }));
    let route = first_geometry(resp).unwrap();
    assert_eq!(route.0["coordinates"], json!([[1, 2], [3, 4]]));
  }

  #[test]
  fn non_ok_code_is_error() {
    let resp =
      parse(json!({ "code": "NoSegment", "message": "no road nearby" }));
    assert!(matches!(
      first_geometry(resp),
      Err(OsrmError::Code { code, .. }) if code == "NoSegment"
    ));
  }

  #[test]
  fn empty_routes_is_error() {
    let resp = parse(json!({ "code": "Ok", "routes": [] }));
    assert!(matches!(first_geometry(resp), Err(OsrmError::NoRoutes)));
  }

  /// Serve `app` on an ephemeral port and return its base URL.
  async fn fake_osrm(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }

  #[tokio::test]
  async fn fetches_route_over_http() {
    let app = Router::new().route(
      "/route/v1/driving/{coords}",
      get(|Path(coords): Path<String>| async move {
        Json(json!({
          "code": "Ok",
          "routes": [{ "geometry": { "type": "LineString", "echo": coords } }],
        }))
      }),
    );
    let client =
      OsrmClient::new(fake_osrm(app).await, Duration::from_secs(5)).unwrap();

    let route = client
      .route(Point::new(38.5, 68.7), Point::new(38.6, 68.8))
      .await
      .unwrap();
    assert_eq!(route.0["type"], "LineString");
    assert_eq!(route.0["echo"], "68.7,38.5;68.8,38.6");
  }

  #[tokio::test]
  async fn server_error_status_is_error() {
    let app = Router::new().route(
      "/route/v1/driving/{coords}",
      get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let client =
      OsrmClient::new(fake_osrm(app).await, Duration::from_secs(5)).unwrap();

    let err = client
      .route(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      OsrmError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE
    ));
  }

  #[tokio::test]
  async fn slow_engine_times_out() {
    let app = Router::new().route(
      "/route/v1/driving/{coords}",
      get(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({ "code": "Ok", "routes": [] }))
      }),
    );
    let base = fake_osrm(app).await;
    let client = OsrmClient::new(base, Duration::from_millis(100)).unwrap();

    let err = client
      .route(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
      .await
      .unwrap_err();
    assert!(matches!(err, OsrmError::Http(e) if e.is_timeout()));
  }
}
