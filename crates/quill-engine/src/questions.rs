//! QuestionStateMachine — submission and the expert action surface.
//!
//! Submission runs both automated-answer paths synchronously within the
//! call and persists everything it produced in one transaction; there are
//! no pending/poll semantics for the caller. Expert actions are serialized
//! per question by the store's optimistic version check.

use chrono::Utc;
use quill_core::{
  Error, Result,
  answer::{Answer, AnswerSource},
  identity::Identity,
  model::SemanticModel,
  page::{Page, PageRequest},
  question::{GapAnalysis, NewQuestion, Question, QuestionStatus},
  store::{QuestionFilter, TriageStore},
  wisdom::Attribution,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{Engine, config::AnswerPrecedence};

/// Everything a submission returns: the created question and whichever
/// automated answer (if any) was produced, with its attributions.
#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
  pub question:       Question,
  pub answer:         Option<Answer>,
  pub auto_answered:  bool,
  pub turbo_answered: bool,
  pub attributions:   Vec<Attribution>,
}

enum AnswerPath {
  Turbo,
  Automation,
  Queue,
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  // ── Submission ────────────────────────────────────────────────────────

  pub async fn submit(
    &self,
    identity: Identity,
    input: NewQuestion,
  ) -> Result<SubmitOutcome> {
    let text = input.text.trim().to_owned();
    if text.is_empty() {
      return Err(Error::EmptyQuestionText);
    }
    let turbo_threshold = if input.turbo_mode {
      let t = input.turbo_threshold.ok_or(Error::TurboThresholdMissing)?;
      self.validate_threshold(t)?;
      Some(t)
    } else {
      None
    };

    // Routing errors on a caller-supplied sub-domain are validation
    // failures and reject the submission before any state exists.
    let route = self.route(input.subdomain_id, &text).await?;

    let now = Utc::now();
    let mut question = Question {
      question_id:         Uuid::new_v4(),
      original_text:       text.clone(),
      status:              QuestionStatus::Submitted,
      priority:            input.priority,
      category:            input.category,
      subdomain_id:        route.subdomain_id,
      routing_origin:      route.origin,
      asked_by:            identity.actor,
      assigned_to:         None,
      created_at:          now,
      routed_at:           now,
      first_response_at:   None,
      resolved_at:         None,
      satisfaction_rating: None,
      gap_analysis:        GapAnalysis::default(),
      version:             0,
    };
    self.transition(&mut question, QuestionStatus::Processing)?;

    // One scoring pass over the live knowledge feeds both the gap analysis
    // and the turbo gate. A slow or failing scorer degrades to "nothing
    // relevant" — submission itself never fails on the automation path.
    let facts = self.store().scorable_facts(now).await?;
    let verdict = match self
      .guarded(
        "knowledge scoring",
        self.model().score_facts(&text, &facts),
      )
      .await
    {
      Ok(scores) => Some(self.analyse_knowledge(&text, &facts, scores)),
      Err(e) => {
        tracing::warn!(error = %e, "knowledge scoring degraded");
        None
      }
    };

    let automation = match self.match_rules(&text).await {
      Ok(suggestion) => suggestion,
      Err(e) if matches!(e.kind(), quill_core::ErrorKind::Upstream) => {
        tracing::warn!(error = %e, "rule matching degraded");
        None
      }
      Err(e) => return Err(e),
    };

    question.gap_analysis = GapAnalysis {
      automation: automation.clone(),
      knowledge:  verdict.as_ref().map(|v| v.analysis.clone()),
    };

    let turbo = turbo_threshold.and_then(|threshold| {
      verdict.as_ref().map(|v| self.decide_turbo(v, threshold))
    });

    let turbo_fired = turbo.as_ref().is_some_and(|t| t.answered);
    let path = match self.config().answer_precedence {
      AnswerPrecedence::TurboFirst if turbo_fired => AnswerPath::Turbo,
      AnswerPrecedence::TurboFirst if automation.is_some() => {
        AnswerPath::Automation
      }
      AnswerPrecedence::AutomationFirst if automation.is_some() => {
        AnswerPath::Automation
      }
      AnswerPrecedence::AutomationFirst if turbo_fired => AnswerPath::Turbo,
      _ => AnswerPath::Queue,
    };

    let mut answer = None;
    let mut attributions = Vec::new();
    let mut used_facts: Vec<Uuid> = Vec::new();

    match path {
      AnswerPath::Turbo => {
        // decide_turbo only answers when a proposed answer exists.
        let outcome = turbo.as_ref().ok_or_else(|| {
          Error::Storage("turbo path chosen without a verdict".into())
        })?;
        let content = verdict
          .as_ref()
          .and_then(|v| v.proposed_answer.clone())
          .ok_or_else(|| {
            Error::Storage("turbo accepted without an answer".into())
          })?;
        self.transition(&mut question, QuestionStatus::TurboAnswered)?;
        question.first_response_at = Some(now);
        attributions = outcome.attributions.clone();
        used_facts = attributions.iter().map(|a| a.fact_id).collect();
        answer = Some(Answer {
          answer_id:    Uuid::new_v4(),
          question_id:  question.question_id,
          content,
          source:       AnswerSource::Automation,
          created_by:   identity.actor,
          delivered_at: now,
        });
      }
      AnswerPath::Automation => {
        let suggestion = automation.as_ref().ok_or_else(|| {
          Error::Storage("automation path chosen without a match".into())
        })?;
        self.transition(&mut question, QuestionStatus::AutoAnswered)?;
        question.first_response_at = Some(now);
        answer = Some(Answer {
          answer_id:    Uuid::new_v4(),
          question_id:  question.question_id,
          content:      suggestion.suggested_answer.clone(),
          source:       AnswerSource::Automation,
          created_by:   identity.actor,
          delivered_at: now,
        });
      }
      AnswerPath::Queue => {
        self.transition(&mut question, QuestionStatus::ExpertQueue)?;
      }
    }

    self
      .store()
      .persist_submission(
        &question,
        answer.as_ref(),
        automation.as_ref().map(|a| a.rule_id),
        &used_facts,
      )
      .await?;

    if !used_facts.is_empty() {
      self.apply_usage_policy(&facts, &used_facts).await?;
    }

    tracing::info!(
      question = %question.question_id,
      status = %question.status,
      "question submitted"
    );

    Ok(SubmitOutcome {
      auto_answered: question.status == QuestionStatus::AutoAnswered,
      turbo_answered: question.status == QuestionStatus::TurboAnswered,
      question,
      answer,
      attributions,
    })
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get_question(&self, id: Uuid) -> Result<Question> {
    self.fetch_question(id).await
  }

  pub async fn list_questions(
    &self,
    filter: &QuestionFilter,
    page: &PageRequest,
  ) -> Result<Page<Question>> {
    self.store().list_questions(filter, page).await
  }

  pub async fn list_answers(&self, question_id: Uuid) -> Result<Vec<Answer>> {
    self.fetch_question(question_id).await?;
    self.store().list_answers(question_id).await
  }

  // ── Expert actions ────────────────────────────────────────────────────

  /// Claim a question. Re-claiming by the current assignee is a no-op;
  /// claiming against someone else is a conflict, and two concurrent
  /// claims resolve to one winner via the version check.
  pub async fn assign(
    &self,
    identity: Identity,
    question_id: Uuid,
  ) -> Result<Question> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "assignment" });
    }
    let mut question = self.fetch_question(question_id).await?;

    if let Some(assignee) = question.assigned_to {
      if assignee == identity.actor {
        return Ok(question);
      }
      return Err(Error::AlreadyAssigned { question_id, assignee });
    }

    question.assigned_to = Some(identity.actor);
    self.transition(&mut question, QuestionStatus::InProgress)?;
    self.store().update_question(&question).await
  }

  /// Deliver an expert answer. Requires assignment and an in-progress
  /// question; the answer row and the status change commit together.
  pub async fn submit_answer(
    &self,
    identity: Identity,
    question_id: Uuid,
    content: String,
    source: AnswerSource,
  ) -> Result<(Question, Answer)> {
    let mut question = self.fetch_question(question_id).await?;
    let Some(assignee) = question.assigned_to else {
      return Err(Error::NotAssigned(question_id));
    };
    if assignee != identity.actor {
      return Err(Error::NotTheAssignee(question_id));
    }

    self.transition(&mut question, QuestionStatus::Answered)?;
    let now = Utc::now();
    if question.first_response_at.is_none() {
      question.first_response_at = Some(now);
    }

    let answer = Answer {
      answer_id:    Uuid::new_v4(),
      question_id,
      content,
      source,
      created_by:   identity.actor,
      delivered_at: now,
    };
    let question = self.store().record_answer(&answer, &question).await?;
    Ok((question, answer))
  }

  /// Ask the requester for more information. Idempotent for the assignee.
  pub async fn request_clarification(
    &self,
    identity: Identity,
    question_id: Uuid,
  ) -> Result<Question> {
    let mut question = self.fetch_question(question_id).await?;
    let Some(assignee) = question.assigned_to else {
      return Err(Error::NotAssigned(question_id));
    };
    if assignee != identity.actor {
      return Err(Error::NotTheAssignee(question_id));
    }
    if question.status == QuestionStatus::NeedsClarification {
      return Ok(question);
    }
    self.transition(&mut question, QuestionStatus::NeedsClarification)?;
    self.store().update_question(&question).await
  }

  /// The requester (or any channel relaying them) has clarified; work
  /// resumes. The message itself travels over the external channel.
  pub async fn provide_clarification(
    &self,
    _identity: Identity,
    question_id: Uuid,
  ) -> Result<Question> {
    let mut question = self.fetch_question(question_id).await?;
    if question.status == QuestionStatus::InProgress {
      return Ok(question);
    }
    self.transition(&mut question, QuestionStatus::InProgress)?;
    self.store().update_question(&question).await
  }

  /// Accept an automated answer — an implicit five-star rating that
  /// resolves the question and credits the rule when the rule path
  /// produced it.
  pub async fn accept_auto_answer(
    &self,
    _identity: Identity,
    question_id: Uuid,
  ) -> Result<Question> {
    let mut question = self.fetch_question(question_id).await?;
    if question.satisfaction_rating.is_some() {
      return Err(Error::AlreadyRated(question_id));
    }
    let was_rule_path = question.status == QuestionStatus::AutoAnswered;
    self.transition(&mut question, QuestionStatus::Resolved)?;
    question.satisfaction_rating = Some(5);
    question.resolved_at = Some(Utc::now());
    let question = self.store().update_question(&question).await?;

    if was_rule_path
      && let Some(suggestion) = &question.gap_analysis.automation
    {
      self
        .store()
        .record_rule_outcome(suggestion.rule_id, true)
        .await?;
    }
    Ok(question)
  }

  /// Reject an automated answer and hand the question to a human. The
  /// original answer stays on record for audit.
  pub async fn reject_auto_answer(
    &self,
    _identity: Identity,
    question_id: Uuid,
    reason: Option<String>,
  ) -> Result<Question> {
    let mut question = self.fetch_question(question_id).await?;
    let was_rule_path = question.status == QuestionStatus::AutoAnswered;
    self.transition(&mut question, QuestionStatus::HumanRequested)?;
    let question = self.store().update_question(&question).await?;

    tracing::info!(
      question = %question_id,
      reason = reason.as_deref().unwrap_or("unspecified"),
      "automated answer rejected"
    );
    if was_rule_path
      && let Some(suggestion) = &question.gap_analysis.automation
    {
      self
        .store()
        .record_rule_outcome(suggestion.rule_id, false)
        .await?;
    }
    Ok(question)
  }

  /// Write-once satisfaction rating; resolves the question.
  pub async fn rate(
    &self,
    _identity: Identity,
    question_id: Uuid,
    rating: u8,
  ) -> Result<Question> {
    if !(1..=5).contains(&rating) {
      return Err(Error::RatingOutOfRange(rating));
    }
    let mut question = self.fetch_question(question_id).await?;
    if question.satisfaction_rating.is_some() {
      return Err(Error::AlreadyRated(question_id));
    }
    self.transition(&mut question, QuestionStatus::Resolved)?;
    question.satisfaction_rating = Some(rating);
    question.resolved_at = Some(Utc::now());
    self.store().update_question(&question).await
  }

  /// Administrative soft-close of a resolved question.
  pub async fn close(
    &self,
    identity: Identity,
    question_id: Uuid,
  ) -> Result<Question> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "closing" });
    }
    let mut question = self.fetch_question(question_id).await?;
    self.transition(&mut question, QuestionStatus::Closed)?;
    self.store().update_question(&question).await
  }
}

#[cfg(test)]
mod tests {
  use quill_core::{
    Error,
    answer::AnswerSource,
    identity::Identity,
    question::{NewQuestion, Priority, QuestionStatus},
    wisdom::FactTier,
  };
  use uuid::Uuid;

  use crate::{
    AnswerPrecedence, EngineConfig,
    testutil::{
      admin, expert, mem_engine, mem_engine_with, seed_fact, seed_rule,
      submit_plain, StaticModel,
    },
  };

  fn turbo_question(text: &str, threshold: f64) -> NewQuestion {
    NewQuestion {
      text:            text.into(),
      subdomain_id:    None,
      category:        None,
      priority:        Priority::Normal,
      turbo_mode:      true,
      turbo_threshold: Some(threshold),
    }
  }

  // ── Submission validation ─────────────────────────────────────────────────

  #[tokio::test]
  async fn empty_text_is_rejected_before_any_state() {
    let engine = mem_engine(StaticModel::default()).await;
    let err = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        NewQuestion {
          text:            "   ".into(),
          subdomain_id:    None,
          category:        None,
          priority:        Priority::Normal,
          turbo_mode:      false,
          turbo_threshold: None,
        },
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::EmptyQuestionText));

    let page = engine
      .list_questions(&Default::default(), &Default::default())
      .await
      .unwrap();
    assert_eq!(page.total, 0);
  }

  #[tokio::test]
  async fn turbo_threshold_outside_option_set_is_rejected() {
    let engine = mem_engine(StaticModel::default()).await;
    let err = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("how do keys rotate", 0.6),
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ThresholdNotConfigured(_)));

    let err = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        NewQuestion {
          turbo_threshold: None,
          ..turbo_question("how do keys rotate", 0.5)
        },
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TurboThresholdMissing));
  }

  // ── Automated paths ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn no_automation_lands_in_expert_queue() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "how do I rotate an api key").await;

    assert_eq!(outcome.question.status, QuestionStatus::ExpertQueue);
    assert!(!outcome.auto_answered);
    assert!(!outcome.turbo_answered);
    assert!(outcome.answer.is_none());
    assert!(outcome.attributions.is_empty());
    assert!(outcome.question.gap_analysis.automation.is_none());
  }

  #[tokio::test]
  async fn rule_match_auto_answers_and_counts_the_trigger() {
    let engine = mem_engine(StaticModel {
      rule_similarity: 0.9,
      ..StaticModel::default()
    })
    .await;
    let rule = seed_rule(&engine, "rotate api key", "Use settings.").await;

    let outcome = submit_plain(&engine, "how do I rotate an api key").await;
    assert_eq!(outcome.question.status, QuestionStatus::AutoAnswered);
    assert!(outcome.auto_answered);
    let answer = outcome.answer.unwrap();
    assert_eq!(answer.content, "Use settings.");
    assert_eq!(answer.source, AnswerSource::Automation);
    assert!(outcome.question.first_response_at.is_some());

    let suggestion = outcome.question.gap_analysis.automation.unwrap();
    assert_eq!(suggestion.rule_id, rule.rule_id);

    let rules = engine.list_rules(&Default::default()).await.unwrap();
    assert_eq!(rules.items[0].times_triggered, 1);
    assert_eq!(rules.items[0].acceptance_rate(), Some(0.0));
  }

  #[tokio::test]
  async fn rule_below_the_floor_never_fires() {
    let engine = mem_engine(StaticModel {
      rule_similarity: 0.5, // below the 0.82 floor
      ..StaticModel::default()
    })
    .await;
    seed_rule(&engine, "rotate api key", "Use settings.").await;

    let outcome = submit_plain(&engine, "how do I rotate an api key").await;
    assert_eq!(outcome.question.status, QuestionStatus::ExpertQueue);
    assert!(outcome.question.gap_analysis.automation.is_none());
  }

  #[tokio::test]
  async fn turbo_boundary_is_inclusive() {
    // Composite = similarity × tier weight (1.0) × confidence (1.0).
    let engine = mem_engine(StaticModel {
      fact_similarity: 0.90,
      ..StaticModel::default()
    })
    .await;
    let fact =
      seed_fact(&engine, "Keys rotate in settings.", FactTier::Tier0a, 1.0)
        .await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("where do keys rotate", 0.90),
      )
      .await
      .unwrap();
    assert!(outcome.turbo_answered);
    assert_eq!(outcome.question.status, QuestionStatus::TurboAnswered);
    assert_eq!(outcome.attributions.len(), 1);
    assert_eq!(outcome.attributions[0].fact_id, fact.fact_id);

    // Usage tracking is part of acceptance.
    let used = engine.get_fact(fact.fact_id).await.unwrap();
    assert_eq!(used.usage_count, 1);
    assert!(used.last_used_at.is_some());
  }

  #[tokio::test]
  async fn lowest_threshold_boundary_is_inclusive_too() {
    let engine = mem_engine(StaticModel {
      fact_similarity: 0.50,
      ..StaticModel::default()
    })
    .await;
    seed_fact(&engine, "Keys rotate in settings.", FactTier::Tier0a, 1.0)
      .await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("where do keys rotate", 0.50),
      )
      .await
      .unwrap();
    assert!(outcome.turbo_answered);
  }

  #[tokio::test]
  async fn turbo_never_accepts_below_threshold() {
    let engine = mem_engine(StaticModel {
      fact_similarity: 0.89,
      ..StaticModel::default()
    })
    .await;
    let fact =
      seed_fact(&engine, "Keys rotate in settings.", FactTier::Tier0a, 1.0)
        .await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("where do keys rotate", 0.90),
      )
      .await
      .unwrap();
    assert!(!outcome.turbo_answered);
    assert_eq!(outcome.question.status, QuestionStatus::ExpertQueue);
    assert!(outcome.answer.is_none());

    // A rejected gate is not a usage.
    let unused = engine.get_fact(fact.fact_id).await.unwrap();
    assert_eq!(unused.usage_count, 0);

    // The gap analysis still records what the store knew.
    let knowledge = outcome.question.gap_analysis.knowledge.unwrap();
    assert_eq!(knowledge.relevant_fact_ids, vec![fact.fact_id]);
  }

  #[tokio::test]
  async fn expired_facts_never_reach_the_turbo_gate() {
    let engine = mem_engine(StaticModel {
      fact_similarity: 1.0,
      ..StaticModel::default()
    })
    .await;
    // Author an expired fact directly.
    let fact = engine
      .author_fact(
        expert(),
        quill_core::wisdom::NewWisdomFact {
          content:            "Stale guidance.".into(),
          tier:               FactTier::Tier0a,
          confidence_score:   1.0,
          importance:         5,
          lifetime:           quill_core::wisdom::Lifetime::Until(
            chrono::Utc::now() - chrono::Duration::days(1),
          ),
          source_answer_id:   None,
          source_document_id: None,
        },
      )
      .await
      .unwrap();

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("anything at all", 0.50),
      )
      .await
      .unwrap();
    assert!(!outcome.turbo_answered);
    assert!(
      !outcome
        .attributions
        .iter()
        .any(|a| a.fact_id == fact.fact_id)
    );
  }

  #[tokio::test]
  async fn turbo_outranks_automation_by_default() {
    let engine = mem_engine(StaticModel {
      rule_similarity: 0.95,
      fact_similarity: 0.95,
      ..StaticModel::default()
    })
    .await;
    seed_rule(&engine, "rotate api key", "Rule answer.").await;
    seed_fact(&engine, "Turbo answer.", FactTier::Tier0a, 1.0).await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("rotate api key", 0.75),
      )
      .await
      .unwrap();
    assert!(outcome.turbo_answered);
    assert!(!outcome.auto_answered);
    assert_eq!(outcome.answer.unwrap().content, "Turbo answer.");
    // Both halves of the gap analysis are on record.
    assert!(outcome.question.gap_analysis.automation.is_some());
    assert!(outcome.question.gap_analysis.knowledge.is_some());
  }

  #[tokio::test]
  async fn automation_first_precedence_flips_the_winner() {
    let engine = mem_engine_with(
      StaticModel {
        rule_similarity: 0.95,
        fact_similarity: 0.95,
        ..StaticModel::default()
      },
      EngineConfig {
        answer_precedence: AnswerPrecedence::AutomationFirst,
        ..EngineConfig::default()
      },
    )
    .await;
    seed_rule(&engine, "rotate api key", "Rule answer.").await;
    seed_fact(&engine, "Turbo answer.", FactTier::Tier0a, 1.0).await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("rotate api key", 0.75),
      )
      .await
      .unwrap();
    assert!(outcome.auto_answered);
    assert!(!outcome.turbo_answered);
    assert_eq!(outcome.answer.unwrap().content, "Rule answer.");
  }

  #[tokio::test]
  async fn hanging_scorer_fails_open_to_expert_queue() {
    let engine = mem_engine_with(
      StaticModel { hang: true, ..StaticModel::default() },
      EngineConfig { model_timeout_ms: 50, ..EngineConfig::default() },
    )
    .await;
    seed_rule(&engine, "rotate api key", "Rule answer.").await;
    seed_fact(&engine, "Turbo answer.", FactTier::Tier0a, 1.0).await;

    let outcome = engine
      .submit(
        Identity::requester(Uuid::new_v4()),
        turbo_question("rotate api key", 0.50),
      )
      .await
      .unwrap();
    assert_eq!(outcome.question.status, QuestionStatus::ExpertQueue);
    assert!(outcome.answer.is_none());
  }

  // ── Expert actions ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn assign_is_exactly_once_with_idempotent_repeat() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "help with the NAS").await;
    let qid = outcome.question.question_id;

    let first = expert();
    let q = engine.assign(first, qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::InProgress);
    assert_eq!(q.assigned_to, Some(first.actor));

    // Same expert again: no-op.
    let again = engine.assign(first, qid).await.unwrap();
    assert_eq!(again.assigned_to, Some(first.actor));

    // A different expert: conflict, assignment unchanged.
    let err = engine.assign(expert(), qid).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyAssigned { .. }));
    let q = engine.get_question(qid).await.unwrap();
    assert_eq!(q.assigned_to, Some(first.actor));
  }

  #[tokio::test]
  async fn answer_requires_assignment() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "help with the NAS").await;
    let qid = outcome.question.question_id;

    let err = engine
      .submit_answer(expert(), qid, "answer".into(), AnswerSource::Expert)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotAssigned(_)));

    let e = expert();
    engine.assign(e, qid).await.unwrap();
    let (q, answer) = engine
      .submit_answer(e, qid, "Expand the volume.".into(), AnswerSource::Expert)
      .await
      .unwrap();
    assert_eq!(q.status, QuestionStatus::Answered);
    assert!(q.first_response_at.is_some());
    assert_eq!(answer.created_by, e.actor);

    // Only one answer per resolution path: a second submission has no
    // valid transition left.
    let err = engine
      .submit_answer(e, qid, "again".into(), AnswerSource::Expert)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }

  #[tokio::test]
  async fn clarification_cycle_round_trips() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "printer prints blank pages").await;
    let qid = outcome.question.question_id;
    let requester = Identity::requester(outcome.question.asked_by);

    let e = expert();
    engine.assign(e, qid).await.unwrap();

    let q = engine.request_clarification(e, qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::NeedsClarification);
    // Idempotent for the assignee.
    let q = engine.request_clarification(e, qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::NeedsClarification);

    let q = engine.provide_clarification(requester, qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::InProgress);
    assert_eq!(q.assigned_to, Some(e.actor));
  }

  #[tokio::test]
  async fn rating_is_write_once() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "wifi drops hourly").await;
    let qid = outcome.question.question_id;
    let requester = Identity::requester(outcome.question.asked_by);

    let e = expert();
    engine.assign(e, qid).await.unwrap();
    engine
      .submit_answer(e, qid, "New firmware.".into(), AnswerSource::Expert)
      .await
      .unwrap();

    let err = engine.rate(requester, qid, 6).await.unwrap_err();
    assert!(matches!(err, Error::RatingOutOfRange(6)));

    let q = engine.rate(requester, qid, 4).await.unwrap();
    assert_eq!(q.status, QuestionStatus::Resolved);
    assert_eq!(q.satisfaction_rating, Some(4));
    assert!(q.resolved_at.is_some());

    // Second rating is rejected; the first value is retained.
    let err = engine.rate(requester, qid, 1).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyRated(_)));
    let q = engine.get_question(qid).await.unwrap();
    assert_eq!(q.satisfaction_rating, Some(4));
  }

  #[tokio::test]
  async fn accepting_an_auto_answer_resolves_with_five_stars() {
    let engine = mem_engine(StaticModel {
      rule_similarity: 0.9,
      ..StaticModel::default()
    })
    .await;
    let rule = seed_rule(&engine, "rotate api key", "Use settings.").await;

    let outcome = submit_plain(&engine, "how do I rotate an api key").await;
    let qid = outcome.question.question_id;
    let requester = Identity::requester(outcome.question.asked_by);

    let q = engine.accept_auto_answer(requester, qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::Resolved);
    assert_eq!(q.satisfaction_rating, Some(5));

    let rules = engine.list_rules(&Default::default()).await.unwrap();
    let r = rules.items.iter().find(|r| r.rule_id == rule.rule_id).unwrap();
    assert_eq!(r.times_accepted, 1);
    assert_eq!(r.acceptance_rate(), Some(1.0));
  }

  #[tokio::test]
  async fn rejecting_an_auto_answer_keeps_it_for_audit() {
    let engine = mem_engine(StaticModel {
      rule_similarity: 0.9,
      ..StaticModel::default()
    })
    .await;
    let rule = seed_rule(&engine, "rotate api key", "Use settings.").await;

    let outcome = submit_plain(&engine, "how do I rotate an api key").await;
    let qid = outcome.question.question_id;
    let requester = Identity::requester(outcome.question.asked_by);

    let q = engine
      .reject_auto_answer(requester, qid, Some("not my issue".into()))
      .await
      .unwrap();
    assert_eq!(q.status, QuestionStatus::HumanRequested);

    // The automated answer survives for audit.
    let answers = engine.list_answers(qid).await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].source, AnswerSource::Automation);

    let rules = engine.list_rules(&Default::default()).await.unwrap();
    let r = rules.items.iter().find(|r| r.rule_id == rule.rule_id).unwrap();
    assert_eq!(r.times_rejected, 1);

    // A human can now pick it up.
    let q = engine.assign(expert(), qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::InProgress);
  }

  #[tokio::test]
  async fn close_is_admin_only_and_needs_resolved() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "monitor flickers").await;
    let qid = outcome.question.question_id;

    let err = engine.close(expert(), qid).await.unwrap_err();
    assert!(matches!(err, Error::AdminOnly { .. }));

    let err = engine.close(admin(), qid).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let requester = Identity::requester(outcome.question.asked_by);
    let e = expert();
    engine.assign(e, qid).await.unwrap();
    engine
      .submit_answer(e, qid, "Swap the cable.".into(), AnswerSource::Expert)
      .await
      .unwrap();
    engine.rate(requester, qid, 5).await.unwrap();

    let q = engine.close(admin(), qid).await.unwrap();
    assert_eq!(q.status, QuestionStatus::Closed);
  }

  #[tokio::test]
  async fn no_direct_jump_is_reachable() {
    let engine = mem_engine(StaticModel::default()).await;
    let outcome = submit_plain(&engine, "keyboard types the wrong letters").await;
    let qid = outcome.question.question_id;
    let requester = Identity::requester(outcome.question.asked_by);

    // submitted → resolved would need rate() from expert_queue.
    let err = engine.rate(requester, qid, 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    // Accepting a non-automated question has no edge either.
    let err = engine.accept_auto_answer(requester, qid).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }
}
