//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use quill_core::{
  Error,
  answer::{Answer, AnswerSource},
  automation::AutomationRule,
  document::{
    ExtractedFactCandidate, ExtractionStatus, KnowledgeDocument,
    ParsingStatus, ValidationStatus,
  },
  page::PageRequest,
  question::{
    GapAnalysis, Priority, Question, QuestionStatus, RouteOrigin,
  },
  routing::{ReassignmentRequest, ReassignmentStatus, SubDomain},
  store::{QuestionFilter, TriageStore},
  wisdom::{FactTier, Lifetime, WisdomFact},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn question(status: QuestionStatus) -> Question {
  Question {
    question_id:         Uuid::new_v4(),
    original_text:       "How do I rotate my API key?".into(),
    status,
    priority:            Priority::Normal,
    category:            Some("security".into()),
    subdomain_id:        None,
    routing_origin:      RouteOrigin::Unrouted,
    asked_by:            Uuid::new_v4(),
    assigned_to:         None,
    created_at:          Utc::now(),
    routed_at:           Utc::now(),
    first_response_at:   None,
    resolved_at:         None,
    satisfaction_rating: None,
    gap_analysis:        GapAnalysis::default(),
    version:             0,
  }
}

fn fact(tier: FactTier, lifetime: Lifetime) -> WisdomFact {
  WisdomFact {
    fact_id:            Uuid::new_v4(),
    content:            "API keys rotate from the settings page.".into(),
    tier,
    confidence_score:   0.9,
    importance:         5,
    lifetime,
    usage_count:        0,
    last_used_at:       None,
    source_answer_id:   None,
    source_document_id: None,
    created_at:         Utc::now(),
  }
}

fn subdomain(name: &str, sla_hours: i64) -> SubDomain {
  SubDomain {
    subdomain_id: Uuid::new_v4(),
    name:         name.into(),
    sla_hours,
    is_active:    true,
    created_at:   Utc::now(),
  }
}

fn document() -> KnowledgeDocument {
  KnowledgeDocument {
    document_id:           Uuid::new_v4(),
    title:                 "Security runbook".into(),
    content:               "Keys rotate quarterly. Tokens expire daily.".into(),
    parsed_text:           None,
    parsing_status:        ParsingStatus::Pending,
    extraction_status:     ExtractionStatus::Pending,
    extracted_facts_count: 0,
    validated_facts_count: 0,
    lifetime:              Lifetime::Perpetual,
    auto_delete_on_expiry: false,
    uploaded_by:           Uuid::new_v4(),
    created_at:            Utc::now(),
  }
}

fn candidate(document_id: Uuid, confidence: f64) -> ExtractedFactCandidate {
  ExtractedFactCandidate {
    candidate_id:          Uuid::new_v4(),
    document_id,
    fact_text:             "Keys rotate quarterly.".into(),
    extraction_confidence: confidence,
    validation_status:     ValidationStatus::Pending,
    rejection_reason:      None,
    created_at:            Utc::now(),
  }
}

fn rule() -> AutomationRule {
  AutomationRule {
    rule_id:         Uuid::new_v4(),
    trigger_text:    "rotate api key".into(),
    answer_text:     "Rotate from settings.".into(),
    enabled:         true,
    times_triggered: 0,
    times_accepted:  0,
    times_rejected:  0,
    created_at:      Utc::now(),
  }
}

// ─── Questions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_roundtrip() {
  let s = store().await;
  let q = question(QuestionStatus::ExpertQueue);

  s.persist_submission(&q, None, None, &[]).await.unwrap();

  let fetched = s.get_question(q.question_id).await.unwrap().unwrap();
  assert_eq!(fetched.question_id, q.question_id);
  assert_eq!(fetched.status, QuestionStatus::ExpertQueue);
  assert_eq!(fetched.original_text, q.original_text);
  assert_eq!(fetched.version, 0);
}

#[tokio::test]
async fn submission_bumps_rule_and_fact_counters() {
  let s = store().await;
  let r = rule();
  s.insert_rule(&r).await.unwrap();
  let f = fact(FactTier::Tier0a, Lifetime::Perpetual);
  s.insert_fact(&f).await.unwrap();

  let mut q = question(QuestionStatus::TurboAnswered);
  q.first_response_at = Some(q.created_at);
  let a = Answer {
    answer_id:    Uuid::new_v4(),
    question_id:  q.question_id,
    content:      "Rotate from settings.".into(),
    source:       AnswerSource::Automation,
    created_by:   q.asked_by,
    delivered_at: q.created_at,
  };

  s.persist_submission(&q, Some(&a), Some(r.rule_id), &[f.fact_id])
    .await
    .unwrap();

  let r2 = s.get_rule(r.rule_id).await.unwrap().unwrap();
  assert_eq!(r2.times_triggered, 1);

  let f2 = s.get_fact(f.fact_id).await.unwrap().unwrap();
  assert_eq!(f2.usage_count, 1);
  assert!(f2.last_used_at.is_some());

  let answers = s.list_answers(q.question_id).await.unwrap();
  assert_eq!(answers.len(), 1);
  assert_eq!(answers[0].source, AnswerSource::Automation);
}

#[tokio::test]
async fn update_question_enforces_version() {
  let s = store().await;
  let q = question(QuestionStatus::ExpertQueue);
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  // First writer wins.
  let mut first = q.clone();
  first.status = QuestionStatus::InProgress;
  first.assigned_to = Some(Uuid::new_v4());
  let updated = s.update_question(&first).await.unwrap();
  assert_eq!(updated.version, 1);

  // Second writer holds the stale version and is refused.
  let mut second = q.clone();
  second.status = QuestionStatus::InProgress;
  second.assigned_to = Some(Uuid::new_v4());
  let err = s.update_question(&second).await.unwrap_err();
  assert!(matches!(err, Error::VersionConflict(_)));

  // The first assignment survives.
  let fetched = s.get_question(q.question_id).await.unwrap().unwrap();
  assert_eq!(fetched.assigned_to, first.assigned_to);
}

#[tokio::test]
async fn update_missing_question_is_not_found() {
  let s = store().await;
  let q = question(QuestionStatus::ExpertQueue);
  let err = s.update_question(&q).await.unwrap_err();
  assert!(matches!(err, Error::QuestionNotFound(_)));
}

#[tokio::test]
async fn list_questions_filters_and_pages() {
  let s = store().await;
  for _ in 0..3 {
    let mut q = question(QuestionStatus::ExpertQueue);
    q.priority = Priority::High;
    s.persist_submission(&q, None, None, &[]).await.unwrap();
  }
  let mut other = question(QuestionStatus::ExpertQueue);
  other.priority = Priority::Low;
  s.persist_submission(&other, None, None, &[]).await.unwrap();

  let page = s
    .list_questions(
      &QuestionFilter {
        priority: Some(Priority::High),
        ..Default::default()
      },
      &PageRequest { page: 1, page_size: 2 },
    )
    .await
    .unwrap();

  assert_eq!(page.total, 3);
  assert_eq!(page.items.len(), 2);
  assert_eq!(page.page, 1);
  assert_eq!(page.page_size, 2);
}

#[tokio::test]
async fn record_answer_is_atomic_with_question_update() {
  let s = store().await;
  let expert = Uuid::new_v4();
  let mut q = question(QuestionStatus::InProgress);
  q.assigned_to = Some(expert);
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  let mut updated = q.clone();
  updated.status = QuestionStatus::Answered;
  updated.first_response_at = Some(Utc::now());
  let a = Answer {
    answer_id:    Uuid::new_v4(),
    question_id:  q.question_id,
    content:      "Here is how.".into(),
    source:       AnswerSource::Expert,
    created_by:   expert,
    delivered_at: Utc::now(),
  };

  let after = s.record_answer(&a, &updated).await.unwrap();
  assert_eq!(after.status, QuestionStatus::Answered);
  assert!(after.first_response_at.is_some());
  assert_eq!(s.list_answers(q.question_id).await.unwrap().len(), 1);
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_facts_never_appear_in_scorable_set() {
  let s = store().await;
  let now = Utc::now();

  let live = fact(FactTier::Tier0a, Lifetime::Perpetual);
  let dated = fact(FactTier::Tier0b, Lifetime::Until(now + Duration::days(30)));
  let expired = fact(FactTier::Tier0a, Lifetime::Until(now - Duration::days(1)));
  let pending = fact(FactTier::Pending, Lifetime::Perpetual);
  let archived = fact(FactTier::Archived, Lifetime::Perpetual);

  for f in [&live, &dated, &expired, &pending, &archived] {
    s.insert_fact(f).await.unwrap();
  }

  let scorable = s.scorable_facts(now).await.unwrap();
  let ids: Vec<_> = scorable.iter().map(|f| f.fact_id).collect();
  assert!(ids.contains(&live.fact_id));
  assert!(ids.contains(&dated.fact_id));
  assert!(!ids.contains(&expired.fact_id));
  assert!(!ids.contains(&pending.fact_id));
  assert!(!ids.contains(&archived.fact_id));
}

#[tokio::test]
async fn archive_sweep_moves_expired_facts_only() {
  let s = store().await;
  let now = Utc::now();

  let expired = fact(FactTier::Tier0c, Lifetime::Until(now - Duration::hours(1)));
  let live = fact(FactTier::Tier0a, Lifetime::Until(now + Duration::hours(1)));
  s.insert_fact(&expired).await.unwrap();
  s.insert_fact(&live).await.unwrap();

  let moved = s.archive_expired_facts(now).await.unwrap();
  assert_eq!(moved, 1);

  let f = s.get_fact(expired.fact_id).await.unwrap().unwrap();
  assert_eq!(f.tier, FactTier::Archived);
  let f = s.get_fact(live.fact_id).await.unwrap().unwrap();
  assert_eq!(f.tier, FactTier::Tier0a);

  // Sweeping again finds nothing new.
  assert_eq!(s.archive_expired_facts(now).await.unwrap(), 0);
}

#[tokio::test]
async fn set_fact_tier_promotes_and_archives() {
  let s = store().await;
  let f = fact(FactTier::Tier0c, Lifetime::Perpetual);
  s.insert_fact(&f).await.unwrap();

  let promoted = s.set_fact_tier(f.fact_id, FactTier::Tier0a).await.unwrap();
  assert_eq!(promoted.tier, FactTier::Tier0a);

  let err = s
    .set_fact_tier(Uuid::new_v4(), FactTier::Tier0a)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::FactNotFound(_)));
}

// ─── Rules ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rule_outcome_counters() {
  let s = store().await;
  let r = rule();
  s.insert_rule(&r).await.unwrap();

  s.record_rule_outcome(r.rule_id, true).await.unwrap();
  s.record_rule_outcome(r.rule_id, false).await.unwrap();
  s.record_rule_outcome(r.rule_id, false).await.unwrap();

  let r2 = s.get_rule(r.rule_id).await.unwrap().unwrap();
  assert_eq!(r2.times_accepted, 1);
  assert_eq!(r2.times_rejected, 2);
}

#[tokio::test]
async fn disabled_rules_are_excluded_from_enabled_set() {
  let s = store().await;
  let r = rule();
  s.insert_rule(&r).await.unwrap();
  assert_eq!(s.enabled_rules().await.unwrap().len(), 1);

  let r2 = s.set_rule_enabled(r.rule_id, false).await.unwrap();
  assert!(!r2.enabled);
  assert!(s.enabled_rules().await.unwrap().is_empty());
}

// ─── Documents & candidates ──────────────────────────────────────────────────

#[tokio::test]
async fn parsing_cas_refuses_wrong_state() {
  let s = store().await;
  let d = document();
  s.insert_document(&d).await.unwrap();

  let d2 = s
    .set_parsing_status(
      d.document_id,
      &[ParsingStatus::Pending, ParsingStatus::Failed],
      ParsingStatus::Processing,
      None,
    )
    .await
    .unwrap();
  assert_eq!(d2.parsing_status, ParsingStatus::Processing);

  // Pending → Processing again misses the CAS.
  let err = s
    .set_parsing_status(
      d.document_id,
      &[ParsingStatus::Pending, ParsingStatus::Failed],
      ParsingStatus::Processing,
      None,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StaleDocumentState(_)));
}

#[tokio::test]
async fn begin_extraction_refuses_while_extracting() {
  let s = store().await;
  let d = document();
  s.insert_document(&d).await.unwrap();

  let d2 = s.begin_extraction(d.document_id).await.unwrap();
  assert_eq!(d2.extraction_status, ExtractionStatus::Extracting);

  let err = s.begin_extraction(d.document_id).await.unwrap_err();
  assert!(matches!(err, Error::ExtractionInProgress(_)));

  // A finished run can be re-extracted.
  s.finish_extraction(d.document_id, ExtractionStatus::Completed, 2)
    .await
    .unwrap();
  s.begin_extraction(d.document_id).await.unwrap();
}

#[tokio::test]
async fn approve_candidate_creates_fact_and_counts() {
  let s = store().await;
  let d = document();
  s.insert_document(&d).await.unwrap();
  let c = candidate(d.document_id, 0.8);
  s.insert_candidate(&c).await.unwrap();

  let mut f = fact(FactTier::Tier0c, Lifetime::Perpetual);
  f.source_document_id = Some(d.document_id);

  let approved = s.approve_candidate(c.candidate_id, &f).await.unwrap();
  assert_eq!(approved.validation_status, ValidationStatus::Approved);

  let stored = s.get_fact(f.fact_id).await.unwrap().unwrap();
  assert_eq!(stored.source_document_id, Some(d.document_id));

  let d2 = s.get_document(d.document_id).await.unwrap().unwrap();
  assert_eq!(d2.validated_facts_count, 1);

  // Approval is irreversible; a second verdict is refused.
  let err = s
    .reject_candidate(c.candidate_id, "changed my mind")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CandidateAlreadyValidated(_)));
}

#[tokio::test]
async fn reject_candidate_is_terminal_with_reason() {
  let s = store().await;
  let d = document();
  s.insert_document(&d).await.unwrap();
  let c = candidate(d.document_id, 0.4);
  s.insert_candidate(&c).await.unwrap();

  let rejected = s
    .reject_candidate(c.candidate_id, "not a fact")
    .await
    .unwrap();
  assert_eq!(rejected.validation_status, ValidationStatus::Rejected);
  assert_eq!(rejected.rejection_reason.as_deref(), Some("not a fact"));

  let f = fact(FactTier::Tier0c, Lifetime::Perpetual);
  let err = s.approve_candidate(c.candidate_id, &f).await.unwrap_err();
  assert!(matches!(err, Error::CandidateAlreadyValidated(_)));
}

#[tokio::test]
async fn expired_document_deletion_honours_opt_in() {
  let s = store().await;
  let now = Utc::now();

  let mut opted = document();
  opted.lifetime = Lifetime::Until(now - Duration::days(1));
  opted.auto_delete_on_expiry = true;
  s.insert_document(&opted).await.unwrap();
  s.insert_candidate(&candidate(opted.document_id, 0.5))
    .await
    .unwrap();

  let mut kept = document();
  kept.lifetime = Lifetime::Until(now - Duration::days(1));
  kept.auto_delete_on_expiry = false;
  s.insert_document(&kept).await.unwrap();

  let gone = s.delete_expired_documents(now).await.unwrap();
  assert_eq!(gone, 1);
  assert!(s.get_document(opted.document_id).await.unwrap().is_none());
  assert!(s.get_document(kept.document_id).await.unwrap().is_some());
}

// ─── Reassignment ────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_approval_moves_question_atomically() {
  let s = store().await;
  let from = subdomain("network", 24);
  let to = subdomain("storage", 8);
  s.insert_subdomain(&from).await.unwrap();
  s.insert_subdomain(&to).await.unwrap();

  let mut q = question(QuestionStatus::InProgress);
  q.subdomain_id = Some(from.subdomain_id);
  q.routing_origin = RouteOrigin::Human;
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  let req = ReassignmentRequest {
    request_id:             Uuid::new_v4(),
    question_id:            q.question_id,
    requested_by:           Uuid::new_v4(),
    current_subdomain_id:   Some(from.subdomain_id),
    suggested_subdomain_id: to.subdomain_id,
    reason:                 "storage expertise needed".into(),
    status:                 ReassignmentStatus::Pending,
    reviewed_by:            None,
    admin_notes:            None,
    created_at:             Utc::now(),
    reviewed_at:            None,
  };
  s.insert_reassignment(&req).await.unwrap();

  let admin = Uuid::new_v4();
  let (reviewed, moved) = s
    .review_reassignment(req.request_id, true, Some("approved"), admin, Utc::now())
    .await
    .unwrap();

  assert_eq!(reviewed.status, ReassignmentStatus::Approved);
  assert_eq!(reviewed.reviewed_by, Some(admin));
  let moved = moved.unwrap();
  assert_eq!(moved.subdomain_id, Some(to.subdomain_id));
  assert!(matches!(moved.routing_origin, RouteOrigin::Human));

  // Terminal once reviewed.
  let err = s
    .review_reassignment(req.request_id, false, None, admin, Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyReviewed(_)));
}

#[tokio::test]
async fn review_rejection_leaves_question_untouched() {
  let s = store().await;
  let from = subdomain("network", 24);
  let to = subdomain("storage", 8);
  s.insert_subdomain(&from).await.unwrap();
  s.insert_subdomain(&to).await.unwrap();

  let mut q = question(QuestionStatus::ExpertQueue);
  q.subdomain_id = Some(from.subdomain_id);
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  let req = ReassignmentRequest {
    request_id:             Uuid::new_v4(),
    question_id:            q.question_id,
    requested_by:           Uuid::new_v4(),
    current_subdomain_id:   Some(from.subdomain_id),
    suggested_subdomain_id: to.subdomain_id,
    reason:                 "wrong pool".into(),
    status:                 ReassignmentStatus::Pending,
    reviewed_by:            None,
    admin_notes:            None,
    created_at:             Utc::now(),
    reviewed_at:            None,
  };
  s.insert_reassignment(&req).await.unwrap();

  let (reviewed, moved) = s
    .review_reassignment(req.request_id, false, None, Uuid::new_v4(), Utc::now())
    .await
    .unwrap();
  assert_eq!(reviewed.status, ReassignmentStatus::Rejected);
  assert!(moved.is_none());

  let q2 = s.get_question(q.question_id).await.unwrap().unwrap();
  assert_eq!(q2.subdomain_id, Some(from.subdomain_id));
}

#[tokio::test]
async fn pending_reassignment_lookup() {
  let s = store().await;
  let to = subdomain("storage", 8);
  s.insert_subdomain(&to).await.unwrap();
  let q = question(QuestionStatus::ExpertQueue);
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  assert!(
    s.pending_reassignment_for(q.question_id)
      .await
      .unwrap()
      .is_none()
  );

  let req = ReassignmentRequest {
    request_id:             Uuid::new_v4(),
    question_id:            q.question_id,
    requested_by:           Uuid::new_v4(),
    current_subdomain_id:   None,
    suggested_subdomain_id: to.subdomain_id,
    reason:                 "needs a pool".into(),
    status:                 ReassignmentStatus::Pending,
    reviewed_by:            None,
    admin_notes:            None,
    created_at:             Utc::now(),
    reviewed_at:            None,
  };
  s.insert_reassignment(&req).await.unwrap();

  let found = s
    .pending_reassignment_for(q.question_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.request_id, req.request_id);
}

// ─── Escalations ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn escalation_is_once_per_window() {
  let s = store().await;
  let sd = subdomain("network", 1);
  s.insert_subdomain(&sd).await.unwrap();
  let mut q = question(QuestionStatus::ExpertQueue);
  q.subdomain_id = Some(sd.subdomain_id);
  s.persist_submission(&q, None, None, &[]).await.unwrap();

  let window = q.routed_at;
  assert!(
    s.record_escalation(q.question_id, window, Utc::now())
      .await
      .unwrap()
  );
  // Same window: already recorded.
  assert!(
    !s.record_escalation(q.question_id, window, Utc::now())
      .await
      .unwrap()
  );
  // A new window (reassignment) escalates again.
  let new_window = window + Duration::hours(2);
  assert!(
    s.record_escalation(q.question_id, new_window, Utc::now())
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn sla_watchlist_joins_subdomain_hours() {
  let s = store().await;
  let sd = subdomain("network", 12);
  s.insert_subdomain(&sd).await.unwrap();

  let mut watched = question(QuestionStatus::ExpertQueue);
  watched.subdomain_id = Some(sd.subdomain_id);
  s.persist_submission(&watched, None, None, &[]).await.unwrap();

  // Unrouted and resolved questions never appear.
  let unrouted = question(QuestionStatus::ExpertQueue);
  s.persist_submission(&unrouted, None, None, &[]).await.unwrap();
  let mut resolved = question(QuestionStatus::Resolved);
  resolved.subdomain_id = Some(sd.subdomain_id);
  s.persist_submission(&resolved, None, None, &[]).await.unwrap();

  let list = s.sla_watchlist().await.unwrap();
  assert_eq!(list.len(), 1);
  assert_eq!(list[0].question.question_id, watched.question_id);
  assert_eq!(list[0].sla_hours, 12);
}

// ─── Sub-domains ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn subdomain_expert_membership() {
  let s = store().await;
  let sd = subdomain("network", 24);
  s.insert_subdomain(&sd).await.unwrap();

  let expert = Uuid::new_v4();
  s.add_subdomain_expert(sd.subdomain_id, expert).await.unwrap();
  // Idempotent.
  s.add_subdomain_expert(sd.subdomain_id, expert).await.unwrap();

  let experts = s.list_subdomain_experts(sd.subdomain_id).await.unwrap();
  assert_eq!(experts, vec![expert]);

  s.remove_subdomain_expert(sd.subdomain_id, expert)
    .await
    .unwrap();
  assert!(
    s.list_subdomain_experts(sd.subdomain_id)
      .await
      .unwrap()
      .is_empty()
  );

  let err = s
    .add_subdomain_expert(Uuid::new_v4(), expert)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SubdomainNotFound(_)));
}

#[tokio::test]
async fn subdomain_patch_updates_selected_fields() {
  let s = store().await;
  let sd = subdomain("network", 24);
  s.insert_subdomain(&sd).await.unwrap();

  let patched = s
    .update_subdomain(
      sd.subdomain_id,
      &quill_core::routing::SubDomainPatch {
        sla_hours: Some(6),
        is_active: Some(false),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(patched.name, "network");
  assert_eq!(patched.sla_hours, 6);
  assert!(!patched.is_active);

  assert!(s.active_subdomains().await.unwrap().is_empty());
}
