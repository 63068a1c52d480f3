//! Answer — immutable once created.
//!
//! A question retains every answer it ever received; rejecting an automated
//! answer preserves the original row for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an answer came from.
///
/// Both automated paths (rule match and turbo) record `Automation`; the
/// question status (`auto_answered` vs `turbo_answered`) carries the path
/// distinction. `AiApproved`/`AiEdited` mark expert-curated drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
  Expert,
  AiApproved,
  AiEdited,
  Automation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id:    Uuid,
  pub question_id:  Uuid,
  pub content:      String,
  pub source:       AnswerSource,
  pub created_by:   Uuid,
  pub delivered_at: DateTime<Utc>,
}
