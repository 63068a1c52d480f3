//! Engine tunables.
//!
//! Defaults are serde-visible so the server can layer them under its own
//! configuration file; everything has a sane default and the engine runs
//! with `EngineConfig::default()` in tests.

use std::time::Duration;

use serde::Deserialize;

/// Which automated path wins when both would independently fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPrecedence {
  /// The explicit, caller-opted turbo decision outranks rule matching.
  TurboFirst,
  AutomationFirst,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// System-wide acceptance floor for automation-rule matches. Deliberately
  /// higher than any turbo threshold option: rules are curated and trusted
  /// more than open-ended knowledge lookup.
  pub automation_floor:        f64,
  /// The enumerated turbo threshold option set. Submissions naming a value
  /// outside this set are rejected, not clamped.
  pub turbo_thresholds:        Vec<f64>,
  pub answer_precedence:       AnswerPrecedence,
  /// Minimum classifier confidence to route a question; below it the
  /// question stays unrouted and queues by category.
  pub classify_min_confidence: f64,
  /// Facts scoring below this similarity never contribute to an automated
  /// answer or its attributions.
  pub relevance_floor:         f64,
  /// Budget for any single semantic-model call on a request path.
  pub model_timeout_ms:        u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      automation_floor:        0.82,
      turbo_thresholds:        vec![0.50, 0.75, 0.90],
      answer_precedence:       AnswerPrecedence::TurboFirst,
      classify_min_confidence: 0.60,
      relevance_floor:         0.25,
      model_timeout_ms:        2_000,
    }
  }
}

impl EngineConfig {
  pub fn model_timeout(&self) -> Duration {
    Duration::from_millis(self.model_timeout_ms)
  }

  /// Membership test for the turbo option set. Thresholds arrive over JSON,
  /// so equality is taken within a float epsilon.
  pub fn is_configured_threshold(&self, t: f64) -> bool {
    self.turbo_thresholds.iter().any(|x| (x - t).abs() < 1e-9)
  }
}
