//! Question — the central entity of the triage engine.
//!
//! A question is created once at submission and afterwards mutated only
//! through the transitions encoded in [`QuestionStatus::can_transition`].
//! Questions are never deleted; the end of life is the `closed` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a question.
///
/// `ExpertQueue` and `HumanRequested` are both "awaiting expert" substates;
/// they differ only in origin (automatic fallback vs. the requester rejecting
/// an automated answer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
  Submitted,
  Processing,
  AutoAnswered,
  TurboAnswered,
  HumanRequested,
  ExpertQueue,
  InProgress,
  NeedsClarification,
  Answered,
  Resolved,
  Closed,
}

impl QuestionStatus {
  /// The complete transition graph. Every status mutation in the engine goes
  /// through this check; there is no other way to move a question.
  pub fn can_transition(self, next: QuestionStatus) -> bool {
    use QuestionStatus::*;
    matches!(
      (self, next),
      (Submitted, Processing)
        | (Processing, AutoAnswered)
        | (Processing, TurboAnswered)
        | (Processing, ExpertQueue)
        | (AutoAnswered, HumanRequested)
        | (AutoAnswered, Resolved)
        | (TurboAnswered, HumanRequested)
        | (TurboAnswered, Resolved)
        | (ExpertQueue, InProgress)
        | (HumanRequested, InProgress)
        | (NeedsClarification, InProgress)
        | (InProgress, NeedsClarification)
        | (InProgress, Answered)
        | (Answered, Resolved)
        | (Resolved, Closed)
    )
  }

  /// `resolved` and `closed` end the lifecycle (modulo the single
  /// administrative `resolved → closed` edge).
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Resolved | Self::Closed)
  }

  /// States in which human work is outstanding and the SLA clock runs.
  pub fn is_sla_watched(self) -> bool {
    matches!(
      self,
      Self::ExpertQueue
        | Self::HumanRequested
        | Self::InProgress
        | Self::NeedsClarification
    )
  }

  /// States from which an expert may still file a reassignment request
  /// (i.e. no answer has been delivered yet).
  pub fn is_unanswered(self) -> bool {
    self.is_sla_watched()
  }
}

impl std::fmt::Display for QuestionStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Submitted => "submitted",
      Self::Processing => "processing",
      Self::AutoAnswered => "auto_answered",
      Self::TurboAnswered => "turbo_answered",
      Self::HumanRequested => "human_requested",
      Self::ExpertQueue => "expert_queue",
      Self::InProgress => "in_progress",
      Self::NeedsClarification => "needs_clarification",
      Self::Answered => "answered",
      Self::Resolved => "resolved",
      Self::Closed => "closed",
    };
    f.write_str(s)
  }
}

// ─── Priority ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Normal,
  High,
  Urgent,
}

// ─── Routing provenance ──────────────────────────────────────────────────────

/// How the question's sub-domain (if any) was decided.
///
/// Kept as an explicit tag on the question rather than inferred after the
/// fact: a human choice is honoured verbatim and never reclassified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOrigin {
  /// The caller (or a reviewing admin) chose the sub-domain explicitly.
  Human,
  /// The classifier inferred the sub-domain with the given confidence.
  Model { confidence: f64 },
  /// No sub-domain could be resolved; the question queues by category.
  Unrouted,
}

// ─── Gap analysis ────────────────────────────────────────────────────────────

/// The automation-rule half of a submission-time gap analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSuggestion {
  pub rule_id:          Uuid,
  pub suggested_answer: String,
  pub similarity:       f64,
}

/// The knowledge-store half of a submission-time gap analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeAnalysis {
  /// Fraction of the question's terms covered by the contributing facts.
  pub coverage:          f64,
  /// Best composite confidence over the contributing facts.
  pub confidence:        f64,
  pub relevant_fact_ids: Vec<Uuid>,
  /// Question terms no live fact covered.
  pub gaps:              Vec<String>,
  pub proposed_answer:   Option<String>,
}

/// Structured record produced once, at submission. Each half is present only
/// when the corresponding automation path produced something — consumers can
/// never observe an impossible combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapAnalysis {
  pub automation: Option<AutomationSuggestion>,
  pub knowledge:  Option<KnowledgeAnalysis>,
}

// ─── Question ────────────────────────────────────────────────────────────────

/// The central entity. Owned exclusively by the state machine; `version` is
/// the optimistic-lock counter bumped on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub question_id:         Uuid,
  pub original_text:       String,
  pub status:              QuestionStatus,
  pub priority:            Priority,
  pub category:            Option<String>,
  pub subdomain_id:        Option<Uuid>,
  pub routing_origin:      RouteOrigin,
  pub asked_by:            Uuid,
  pub assigned_to:         Option<Uuid>,
  pub created_at:          DateTime<Utc>,
  /// Start of the current SLA window; reset by an approved reassignment.
  pub routed_at:           DateTime<Utc>,
  pub first_response_at:   Option<DateTime<Utc>>,
  pub resolved_at:         Option<DateTime<Utc>>,
  /// 1–5, write-once. A second rating is rejected, never overwritten.
  pub satisfaction_rating: Option<u8>,
  pub gap_analysis:        GapAnalysis,
  pub version:             i64,
}

// ─── NewQuestion ─────────────────────────────────────────────────────────────

/// Input to submission. `turbo_threshold` is meaningful only with
/// `turbo_mode` and must be a member of the configured option set.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
  pub text:            String,
  pub subdomain_id:    Option<Uuid>,
  /// The observed client sends this field as `department`.
  #[serde(alias = "department")]
  pub category:        Option<String>,
  #[serde(default)]
  pub priority:        Priority,
  #[serde(default)]
  pub turbo_mode:      bool,
  pub turbo_threshold: Option<f64>,
}
