//! Error types for `quill-core`.
//!
//! Variants are specific; [`Error::kind`] classifies them onto the engine's
//! error taxonomy, which is what the API layer maps to HTTP statuses. Every
//! rejecting variant follows the same contract: the action is refused and
//! existing state is untouched.

use thiserror::Error;
use uuid::Uuid;

use crate::question::QuestionStatus;

/// The taxonomy an [`Error`] classifies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed input, rejected before any state change.
  Validation,
  /// The action raced or repeated against existing state; caller re-fetches.
  Conflict,
  /// A required prior step has not happened.
  Precondition,
  NotFound,
  /// The claims passed in do not permit the action.
  Forbidden,
  /// The semantic model was slow or unavailable.
  Upstream,
  Storage,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("question text is empty")]
  EmptyQuestionText,

  #[error("rating must be between 1 and 5, got {0}")]
  RatingOutOfRange(u8),

  #[error("turbo threshold {0} is not in the configured option set")]
  ThresholdNotConfigured(f64),

  #[error("confidence must be within 0.0..=1.0, got {0}")]
  ConfidenceOutOfRange(f64),

  #[error("importance must be between 1 and 10, got {0}")]
  ImportanceOutOfRange(u8),

  #[error("sub-domain {0} is not active")]
  SubdomainInactive(Uuid),

  #[error("sla_hours must be positive, got {0}")]
  SlaHoursOutOfRange(i64),

  #[error("turbo_mode requires a turbo_threshold")]
  TurboThresholdMissing,

  // ── Conflict ────────────────────────────────────────────────────────────
  #[error("question {question_id} is already assigned to {assignee}")]
  AlreadyAssigned { question_id: Uuid, assignee: Uuid },

  #[error("question {0} is already rated")]
  AlreadyRated(Uuid),

  #[error("reassignment request {0} is already reviewed")]
  AlreadyReviewed(Uuid),

  #[error("candidate {0} already has a terminal validation status")]
  CandidateAlreadyValidated(Uuid),

  #[error("document {0} is already extracting")]
  ExtractionInProgress(Uuid),

  #[error("document {0} changed state concurrently")]
  StaleDocumentState(Uuid),

  #[error("question {0} was modified concurrently")]
  VersionConflict(Uuid),

  #[error("question {0} already has a pending reassignment request")]
  ReassignmentPending(Uuid),

  // ── Precondition ────────────────────────────────────────────────────────
  #[error("question {0} has no assigned expert")]
  NotAssigned(Uuid),

  #[error("only the assigned expert may act on question {0}")]
  NotTheAssignee(Uuid),

  #[error("document {0} has not completed parsing")]
  ParsingIncomplete(Uuid),

  #[error("question {0} has already been answered")]
  QuestionAlreadyAnswered(Uuid),

  #[error("cannot move a question from {from} to {to}")]
  InvalidTransition {
    from: QuestionStatus,
    to:   QuestionStatus,
  },

  // ── Not found ───────────────────────────────────────────────────────────
  #[error("question not found: {0}")]
  QuestionNotFound(Uuid),

  #[error("sub-domain not found: {0}")]
  SubdomainNotFound(Uuid),

  #[error("fact not found: {0}")]
  FactNotFound(Uuid),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("candidate not found: {0}")]
  CandidateNotFound(Uuid),

  #[error("reassignment request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("automation rule not found: {0}")]
  RuleNotFound(Uuid),

  // ── Forbidden ───────────────────────────────────────────────────────────
  #[error("{action} requires the admin role")]
  AdminOnly { action: &'static str },

  #[error("{action} requires the expert role")]
  ExpertOnly { action: &'static str },

  // ── Upstream ────────────────────────────────────────────────────────────
  #[error("semantic model timed out during {0}")]
  UpstreamTimeout(&'static str),

  #[error("semantic model failed: {0}")]
  Upstream(String),

  // ── Plumbing ────────────────────────────────────────────────────────────
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    use Error::*;
    match self {
      EmptyQuestionText
      | RatingOutOfRange(_)
      | ThresholdNotConfigured(_)
      | ConfidenceOutOfRange(_)
      | ImportanceOutOfRange(_)
      | SubdomainInactive(_)
      | SlaHoursOutOfRange(_)
      | TurboThresholdMissing => ErrorKind::Validation,

      AlreadyAssigned { .. }
      | AlreadyRated(_)
      | AlreadyReviewed(_)
      | CandidateAlreadyValidated(_)
      | ExtractionInProgress(_)
      | StaleDocumentState(_)
      | VersionConflict(_)
      | ReassignmentPending(_) => ErrorKind::Conflict,

      NotAssigned(_)
      | NotTheAssignee(_)
      | ParsingIncomplete(_)
      | QuestionAlreadyAnswered(_)
      | InvalidTransition { .. } => ErrorKind::Precondition,

      QuestionNotFound(_)
      | SubdomainNotFound(_)
      | FactNotFound(_)
      | DocumentNotFound(_)
      | CandidateNotFound(_)
      | RequestNotFound(_)
      | RuleNotFound(_) => ErrorKind::NotFound,

      AdminOnly { .. } | ExpertOnly { .. } => ErrorKind::Forbidden,

      UpstreamTimeout(_) | Upstream(_) => ErrorKind::Upstream,

      Serialization(_) | Storage(_) => ErrorKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
