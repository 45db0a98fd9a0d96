//! Caller identity as established by the external identity service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a caller acts in. Every credential carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Rider,
  Driver,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Rider => "rider",
      Self::Driver => "driver",
    }
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An authenticated caller. Trusted as-is by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
  pub id:   Uuid,
  pub role: Role,
}

impl Caller {
  pub fn rider(id: Uuid) -> Self { Self { id, role: Role::Rider } }

  pub fn driver(id: Uuid) -> Self { Self { id, role: Role::Driver } }
}
