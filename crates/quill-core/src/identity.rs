//! Request-scoped identity claims.
//!
//! Authentication itself is out of scope — a fronting proxy verifies the
//! caller and injects claims. Every engine call takes an [`Identity`]
//! explicitly; there is no ambient session state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Requester,
  Expert,
  Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub actor: Uuid,
  pub role:  Role,
}

impl Identity {
  pub fn requester(actor: Uuid) -> Self {
    Self { actor, role: Role::Requester }
  }

  pub fn expert(actor: Uuid) -> Self {
    Self { actor, role: Role::Expert }
  }

  pub fn admin(actor: Uuid) -> Self {
    Self { actor, role: Role::Admin }
  }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  /// Experts and admins both count as expert-capable.
  pub fn is_expert(&self) -> bool {
    matches!(self.role, Role::Expert | Role::Admin)
  }
}
