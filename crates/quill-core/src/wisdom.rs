//! WisdomFact — the tiered unit of the knowledge store.
//!
//! Tier reflects trust, not content: it is assigned at creation/validation
//! time and moves only through the explicit promote/demote operation or an
//! installed tier policy. Expired facts are archived by the background sweep,
//! never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Tier ────────────────────────────────────────────────────────────────────

/// Trust tier. 0a/0b/0c are decreasing automated-trust levels; `Pending`
/// awaits expert validation; `Archived` is the soft-deleted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactTier {
  #[serde(rename = "tier_0a")]
  Tier0a,
  #[serde(rename = "tier_0b")]
  Tier0b,
  #[serde(rename = "tier_0c")]
  Tier0c,
  Pending,
  Archived,
}

impl FactTier {
  /// Whether facts of this tier may contribute to automated answers.
  pub fn is_scorable(self) -> bool {
    matches!(self, Self::Tier0a | Self::Tier0b | Self::Tier0c)
  }

  /// Trust weight applied to similarity when computing composite confidence.
  pub fn trust_weight(self) -> f64 {
    match self {
      Self::Tier0a => 1.0,
      Self::Tier0b => 0.9,
      Self::Tier0c => 0.8,
      Self::Pending | Self::Archived => 0.0,
    }
  }
}

impl std::fmt::Display for FactTier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Tier0a => "tier_0a",
      Self::Tier0b => "tier_0b",
      Self::Tier0c => "tier_0c",
      Self::Pending => "pending",
      Self::Archived => "archived",
    };
    f.write_str(s)
  }
}

// ─── Lifetime ────────────────────────────────────────────────────────────────

/// Exactly one of the two variants governs a fact's lifetime — the
/// good_until XOR is_perpetual invariant holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Lifetime {
  Perpetual,
  Until(DateTime<Utc>),
}

impl Lifetime {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    match self {
      Self::Perpetual => false,
      Self::Until(d) => *d < now,
    }
  }
}

// ─── WisdomFact ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WisdomFact {
  pub fact_id:            Uuid,
  pub content:            String,
  pub tier:               FactTier,
  /// Continuous 0–1 confidence from authoring or extraction.
  pub confidence_score:   f64,
  /// 1–10.
  pub importance:         u8,
  pub lifetime:           Lifetime,
  pub usage_count:        i64,
  /// Updated whenever the fact contributes to an automated answer.
  pub last_used_at:       Option<DateTime<Utc>>,
  pub source_answer_id:   Option<Uuid>,
  pub source_document_id: Option<Uuid>,
  pub created_at:         DateTime<Utc>,
}

impl WisdomFact {
  /// A fact is live for automation when its tier is scorable and its
  /// lifetime has not lapsed.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    self.tier.is_scorable() && !self.lifetime.is_expired(now)
  }
}

// ─── NewWisdomFact ───────────────────────────────────────────────────────────

/// Input to expert fact authoring. `fact_id`/timestamps are engine-assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWisdomFact {
  pub content:            String,
  pub tier:               FactTier,
  pub confidence_score:   f64,
  pub importance:         u8,
  pub lifetime:           Lifetime,
  pub source_answer_id:   Option<Uuid>,
  pub source_document_id: Option<Uuid>,
}

// ─── Attribution ─────────────────────────────────────────────────────────────

/// Role a fact played in an automated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
  /// The fact whose content seeded the proposed answer.
  Primary,
  Supporting,
}

/// Audit record attached to every automated answer. An automated answer
/// without attributions is invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
  pub fact_id:      Uuid,
  pub contribution: ContributionKind,
  pub similarity:   f64,
}
