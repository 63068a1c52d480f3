//! Automation rules — the curated corpus the matcher searches.
//!
//! The matcher reads rules and bumps counters; rule text itself is only ever
//! edited through the admin surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
  pub rule_id:         Uuid,
  /// Text the incoming question is scored against.
  pub trigger_text:    String,
  /// Canned answer delivered on a match.
  pub answer_text:     String,
  pub enabled:         bool,
  pub times_triggered: i64,
  pub times_accepted:  i64,
  pub times_rejected:  i64,
  pub created_at:      DateTime<Utc>,
}

impl AutomationRule {
  /// Accepted / triggered. `None` until the rule has fired at least once —
  /// acceptance analytics never divide by zero.
  pub fn acceptance_rate(&self) -> Option<f64> {
    if self.times_triggered == 0 {
      None
    } else {
      Some(self.times_accepted as f64 / self.times_triggered as f64)
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAutomationRule {
  pub trigger_text: String,
  pub answer_text:  String,
  #[serde(default = "default_enabled")]
  pub enabled:      bool,
}

fn default_enabled() -> bool { true }
