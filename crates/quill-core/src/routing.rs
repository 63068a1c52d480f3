//! Sub-domains (expert pools) and the reassignment approval workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── SubDomain ───────────────────────────────────────────────────────────────

/// An expert pool with an SLA. Experts are many-to-many with sub-domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubDomain {
  pub subdomain_id: Uuid,
  pub name:         String,
  pub sla_hours:    i64,
  pub is_active:    bool,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubDomain {
  pub name:      String,
  pub sla_hours: i64,
  #[serde(default = "default_active")]
  pub is_active: bool,
}

fn default_active() -> bool { true }

/// Partial update for a sub-domain; unset fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubDomainPatch {
  pub name:      Option<String>,
  pub sla_hours: Option<i64>,
  pub is_active: Option<bool>,
}

// ─── ReassignmentRequest ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignmentStatus {
  Pending,
  Approved,
  Rejected,
}

/// An expert's request to move a question to a different sub-domain.
/// Filing one does not change routing; only an admin approval does, and the
/// approval updates the question atomically with the request. Terminal once
/// reviewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignmentRequest {
  pub request_id:             Uuid,
  pub question_id:            Uuid,
  pub requested_by:           Uuid,
  pub current_subdomain_id:   Option<Uuid>,
  pub suggested_subdomain_id: Uuid,
  pub reason:                 String,
  pub status:                 ReassignmentStatus,
  pub reviewed_by:            Option<Uuid>,
  pub admin_notes:            Option<String>,
  pub created_at:             DateTime<Utc>,
  pub reviewed_at:            Option<DateTime<Utc>>,
}
