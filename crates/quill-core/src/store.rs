//! The `TriageStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `quill-store-sqlite`).
//! The engine and API layers depend on this abstraction, not on any concrete
//! backend.
//!
//! Where the engine requires two entities to change together (an answer and
//! its question, a candidate and the fact it becomes, a reassignment review
//! and the routed question), the trait carries a bespoke operation so the
//! backend can execute both effects in one transaction. Question writes go
//! through an optimistic per-row version check: the backend compares the
//! supplied `version` against the stored row and refuses stale writers with
//! [`Error::VersionConflict`](crate::Error::VersionConflict), so unrelated
//! questions proceed concurrently without a global lock.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error,
  answer::Answer,
  automation::AutomationRule,
  document::{
    ExtractedFactCandidate, ExtractionStatus, KnowledgeDocument,
    ParsingStatus, ValidationStatus,
  },
  page::{Page, PageRequest},
  question::{Priority, Question, QuestionStatus},
  routing::{ReassignmentRequest, ReassignmentStatus, SubDomain, SubDomainPatch},
  wisdom::{FactTier, WisdomFact},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Filters for the question queue listing.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
  pub status:       Option<QuestionStatus>,
  pub category:     Option<String>,
  pub priority:     Option<Priority>,
  pub subdomain_id: Option<Uuid>,
  pub assigned_to:  Option<Uuid>,
}

/// A question joined with its sub-domain's SLA, for the periodic scan.
#[derive(Debug, Clone)]
pub struct SlaEntry {
  pub question:  Question,
  pub sla_hours: i64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Quill storage backend.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded async runtime (tokio with axum). Methods return
/// [`crate::Error`] directly rather than an associated error type: the
/// engine has to classify storage-raised conflicts (version checks,
/// compare-and-set misses, terminal-status guards) into the taxonomy, which
/// an opaque backend error could not express.
pub trait TriageStore: Send + Sync {
  // ── Questions ─────────────────────────────────────────────────────────

  /// Persist a freshly-submitted question together with everything the
  /// submission produced: the automated answer (if any), the triggered
  /// rule's counter bump, and usage touches for the attributed facts.
  /// All effects commit in one transaction.
  fn persist_submission<'a>(
    &'a self,
    question: &'a Question,
    answer: Option<&'a Answer>,
    triggered_rule: Option<Uuid>,
    used_facts: &'a [Uuid],
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_question(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Question>, Error>> + Send + '_;

  fn list_questions<'a>(
    &'a self,
    filter: &'a QuestionFilter,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<Question>, Error>> + Send + 'a;

  /// Write back a mutated question. `question.version` must hold the value
  /// the caller read; the stored row is updated to `version + 1` only if it
  /// still matches, otherwise [`Error::VersionConflict`]. Returns the
  /// updated row.
  fn update_question<'a>(
    &'a self,
    question: &'a Question,
  ) -> impl Future<Output = Result<Question, Error>> + Send + 'a;

  /// Insert an answer and write back its (already mutated) question in one
  /// transaction, under the same version check as [`update_question`].
  ///
  /// [`update_question`]: TriageStore::update_question
  fn record_answer<'a>(
    &'a self,
    answer: &'a Answer,
    question: &'a Question,
  ) -> impl Future<Output = Result<Question, Error>> + Send + 'a;

  fn list_answers(
    &self,
    question_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Answer>, Error>> + Send + '_;

  // ── Wisdom facts ──────────────────────────────────────────────────────

  fn insert_fact<'a>(
    &'a self,
    fact: &'a WisdomFact,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_fact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<WisdomFact>, Error>> + Send + '_;

  fn list_facts<'a>(
    &'a self,
    tier: Option<FactTier>,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<WisdomFact>, Error>> + Send + 'a;

  /// Explicit promote/demote (or archive). Tier is the only mutable part of
  /// a fact's trust; content edits never move it.
  fn set_fact_tier(
    &self,
    id: Uuid,
    tier: FactTier,
  ) -> impl Future<Output = Result<WisdomFact, Error>> + Send + '_;

  /// Facts eligible for automated answering: scorable tier, not expired at
  /// `now`. This is the only read path the matcher and turbo use.
  fn scorable_facts(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<WisdomFact>, Error>> + Send + '_;

  /// Everything except archived facts, for expert-facing semantic search.
  fn searchable_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<WisdomFact>, Error>> + Send + '_;

  /// Bump `usage_count` and set `last_used_at` for each listed fact.
  fn touch_fact_usage<'a>(
    &'a self,
    ids: &'a [Uuid],
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  /// Sweep: move expired, non-perpetual, non-archived facts to `archived`.
  /// Returns how many moved.
  fn archive_expired_facts(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Error>> + Send + '_;

  // ── Automation rules ──────────────────────────────────────────────────

  fn insert_rule<'a>(
    &'a self,
    rule: &'a AutomationRule,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_rule(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AutomationRule>, Error>> + Send + '_;

  fn list_rules<'a>(
    &'a self,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<AutomationRule>, Error>> + Send + 'a;

  fn set_rule_enabled(
    &self,
    id: Uuid,
    enabled: bool,
  ) -> impl Future<Output = Result<AutomationRule, Error>> + Send + '_;

  fn enabled_rules(
    &self,
  ) -> impl Future<Output = Result<Vec<AutomationRule>, Error>> + Send + '_;

  /// Credit `times_accepted` or `times_rejected` after the requester's
  /// verdict on a rule-produced answer.
  fn record_rule_outcome(
    &self,
    id: Uuid,
    accepted: bool,
  ) -> impl Future<Output = Result<(), Error>> + Send + '_;

  // ── Documents & candidates ────────────────────────────────────────────

  fn insert_document<'a>(
    &'a self,
    document: &'a KnowledgeDocument,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_document(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<KnowledgeDocument>, Error>> + Send + '_;

  fn list_documents<'a>(
    &'a self,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<KnowledgeDocument>, Error>> + Send + 'a;

  /// Compare-and-set on `parsing_status`: move to `to` (recording
  /// `parsed_text` when supplied) only if the current status is one of
  /// `from`; a miss is [`Error::StaleDocumentState`].
  fn set_parsing_status<'a>(
    &'a self,
    id: Uuid,
    from: &'a [ParsingStatus],
    to: ParsingStatus,
    parsed_text: Option<&'a str>,
  ) -> impl Future<Output = Result<KnowledgeDocument, Error>> + Send + 'a;

  /// Compare-and-set `extraction_status` to `extracting`. A document already
  /// extracting is refused with [`Error::ExtractionInProgress`] — concurrent
  /// extraction of the same document is rejected, not queued.
  fn begin_extraction(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<KnowledgeDocument, Error>> + Send + '_;

  /// Record the terminal outcome of an extraction run and the produced
  /// candidate count.
  fn finish_extraction(
    &self,
    id: Uuid,
    status: ExtractionStatus,
    extracted_count: i64,
  ) -> impl Future<Output = Result<KnowledgeDocument, Error>> + Send + '_;

  fn insert_candidate<'a>(
    &'a self,
    candidate: &'a ExtractedFactCandidate,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_candidate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ExtractedFactCandidate>, Error>> + Send + '_;

  fn list_candidates<'a>(
    &'a self,
    document_id: Uuid,
    status: Option<ValidationStatus>,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<ExtractedFactCandidate>, Error>> + Send + 'a;

  /// All `pending` candidates of a document, for bulk approval.
  fn pending_candidates(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ExtractedFactCandidate>, Error>> + Send + '_;

  /// Approve a candidate into the knowledge store: mark it `approved`,
  /// insert the fact it becomes, and bump the document's validated count —
  /// one transaction, irreversible. A candidate already terminal is refused
  /// with [`Error::CandidateAlreadyValidated`].
  fn approve_candidate<'a>(
    &'a self,
    candidate_id: Uuid,
    fact: &'a WisdomFact,
  ) -> impl Future<Output = Result<ExtractedFactCandidate, Error>> + Send + 'a;

  /// Terminal rejection with a reason. Same already-terminal guard as
  /// approval.
  fn reject_candidate<'a>(
    &'a self,
    candidate_id: Uuid,
    reason: &'a str,
  ) -> impl Future<Output = Result<ExtractedFactCandidate, Error>> + Send + 'a;

  /// Move a pending candidate to `needs_review`.
  fn flag_candidate(
    &self,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<ExtractedFactCandidate, Error>> + Send + '_;

  /// Sweep: delete expired documents that opted into
  /// `auto_delete_on_expiry`, along with their candidate rows. Facts already
  /// approved out of them are untouched. Returns how many documents went.
  fn delete_expired_documents(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Error>> + Send + '_;

  // ── Sub-domains ───────────────────────────────────────────────────────

  fn insert_subdomain<'a>(
    &'a self,
    subdomain: &'a SubDomain,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_subdomain(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SubDomain>, Error>> + Send + '_;

  fn list_subdomains<'a>(
    &'a self,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<SubDomain>, Error>> + Send + 'a;

  /// Active sub-domains, the classifier's option set.
  fn active_subdomains(
    &self,
  ) -> impl Future<Output = Result<Vec<SubDomain>, Error>> + Send + '_;

  fn update_subdomain<'a>(
    &'a self,
    id: Uuid,
    patch: &'a SubDomainPatch,
  ) -> impl Future<Output = Result<SubDomain, Error>> + Send + 'a;

  /// Idempotent membership add.
  fn add_subdomain_expert(
    &self,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> impl Future<Output = Result<(), Error>> + Send + '_;

  fn remove_subdomain_expert(
    &self,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> impl Future<Output = Result<(), Error>> + Send + '_;

  fn list_subdomain_experts(
    &self,
    subdomain_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Error>> + Send + '_;

  // ── Reassignment ──────────────────────────────────────────────────────

  fn insert_reassignment<'a>(
    &'a self,
    request: &'a ReassignmentRequest,
  ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

  fn get_reassignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ReassignmentRequest>, Error>> + Send + '_;

  fn list_reassignments<'a>(
    &'a self,
    status: Option<ReassignmentStatus>,
    page: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<ReassignmentRequest>, Error>> + Send + 'a;

  fn pending_reassignment_for(
    &self,
    question_id: Uuid,
  ) -> impl Future<Output = Result<Option<ReassignmentRequest>, Error>> + Send + '_;

  /// Review a pending request. Approval marks the request and re-routes the
  /// question (new sub-domain, fresh SLA window, human origin) in one
  /// transaction; rejection marks the request and leaves the question
  /// untouched. A request already reviewed is refused with
  /// [`Error::AlreadyReviewed`]. Returns the reviewed request and, on
  /// approval, the updated question.
  fn review_reassignment<'a>(
    &'a self,
    request_id: Uuid,
    approve: bool,
    notes: Option<&'a str>,
    reviewer: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(ReassignmentRequest, Option<Question>), Error>>
  + Send
  + 'a;

  // ── Escalations ───────────────────────────────────────────────────────

  /// Record an SLA breach for `(question, window_start)`. Returns `true` if
  /// this is the first escalation of that window, `false` if it was already
  /// recorded — the uniqueness that makes emission exactly-once.
  fn record_escalation(
    &self,
    question_id: Uuid,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Error>> + Send + '_;

  /// Every question in an SLA-watched state that has a resolved sub-domain,
  /// joined with that sub-domain's `sla_hours`.
  fn sla_watchlist(
    &self,
  ) -> impl Future<Output = Result<Vec<SlaEntry>, Error>> + Send + '_;
}
