//! Errors from the OSRM route lookup client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OsrmError {
  #[error("request to routing engine failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("routing engine returned HTTP {0}")]
  Status(reqwest::StatusCode),

  /// The engine answered but reported something other than `"Ok"`.
  #[error("routing engine returned code {code}: {message}")]
  Code { code: String, message: String },

  #[error("routing engine found no route")]
  NoRoutes,
}
