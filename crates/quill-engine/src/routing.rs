//! SubdomainRouter and the reassignment approval workflow.
//!
//! A caller-supplied sub-domain is honoured verbatim (after an existence and
//! active check); otherwise the classifier runs with a timeout and the
//! question falls back to category queueing when it cannot decide. Filing a
//! reassignment request never changes routing — only an admin approval does,
//! atomically with the request row.

use chrono::Utc;
use quill_core::{
  Error, Result,
  identity::Identity,
  model::SemanticModel,
  page::{Page, PageRequest},
  question::{Question, RouteOrigin},
  routing::{
    NewSubDomain, ReassignmentRequest, ReassignmentStatus, SubDomain,
    SubDomainPatch,
  },
  store::TriageStore,
};
use uuid::Uuid;

use crate::Engine;

/// Where a submission ended up, with provenance.
pub(crate) struct RouteDecision {
  pub subdomain_id: Option<Uuid>,
  pub origin:       RouteOrigin,
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  // ── Routing ───────────────────────────────────────────────────────────

  pub(crate) async fn route(
    &self,
    supplied: Option<Uuid>,
    text: &str,
  ) -> Result<RouteDecision> {
    if let Some(id) = supplied {
      let subdomain = self
        .store()
        .get_subdomain(id)
        .await?
        .ok_or(Error::SubdomainNotFound(id))?;
      if !subdomain.is_active {
        return Err(Error::SubdomainInactive(id));
      }
      return Ok(RouteDecision {
        subdomain_id: Some(id),
        origin:       RouteOrigin::Human,
      });
    }

    let options = self.store().active_subdomains().await?;
    if options.is_empty() {
      return Ok(unrouted());
    }

    match self
      .guarded("classification", self.model().classify(text, &options))
      .await
    {
      Ok(Some(c)) if c.confidence >= self.config().classify_min_confidence => {
        Ok(RouteDecision {
          subdomain_id: Some(c.subdomain_id),
          origin:       RouteOrigin::Model { confidence: c.confidence },
        })
      }
      Ok(_) => Ok(unrouted()),
      Err(e) => {
        // Fail open: an unreachable classifier must not block submission.
        tracing::warn!(error = %e, "classification degraded; unrouted");
        Ok(unrouted())
      }
    }
  }

  // ── Sub-domain admin surface ──────────────────────────────────────────

  pub async fn create_subdomain(
    &self,
    identity: Identity,
    input: NewSubDomain,
  ) -> Result<SubDomain> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "sub-domain creation" });
    }
    if input.sla_hours <= 0 {
      return Err(Error::SlaHoursOutOfRange(input.sla_hours));
    }
    let subdomain = SubDomain {
      subdomain_id: Uuid::new_v4(),
      name:         input.name,
      sla_hours:    input.sla_hours,
      is_active:    input.is_active,
      created_at:   Utc::now(),
    };
    self.store().insert_subdomain(&subdomain).await?;
    Ok(subdomain)
  }

  pub async fn get_subdomain(&self, id: Uuid) -> Result<SubDomain> {
    self
      .store()
      .get_subdomain(id)
      .await?
      .ok_or(Error::SubdomainNotFound(id))
  }

  pub async fn list_subdomains(
    &self,
    page: &PageRequest,
  ) -> Result<Page<SubDomain>> {
    self.store().list_subdomains(page).await
  }

  pub async fn update_subdomain(
    &self,
    identity: Identity,
    id: Uuid,
    patch: SubDomainPatch,
  ) -> Result<SubDomain> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "sub-domain updates" });
    }
    if let Some(h) = patch.sla_hours
      && h <= 0
    {
      return Err(Error::SlaHoursOutOfRange(h));
    }
    self.store().update_subdomain(id, &patch).await
  }

  pub async fn add_subdomain_expert(
    &self,
    identity: Identity,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> Result<Vec<Uuid>> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "expert assignment" });
    }
    self
      .store()
      .add_subdomain_expert(subdomain_id, expert)
      .await?;
    self.store().list_subdomain_experts(subdomain_id).await
  }

  pub async fn remove_subdomain_expert(
    &self,
    identity: Identity,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> Result<Vec<Uuid>> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "expert assignment" });
    }
    self
      .store()
      .remove_subdomain_expert(subdomain_id, expert)
      .await?;
    self.store().list_subdomain_experts(subdomain_id).await
  }

  pub async fn list_subdomain_experts(
    &self,
    subdomain_id: Uuid,
  ) -> Result<Vec<Uuid>> {
    self.get_subdomain(subdomain_id).await?;
    self.store().list_subdomain_experts(subdomain_id).await
  }

  // ── Reassignment workflow ─────────────────────────────────────────────

  /// File a reassignment proposal. Allowed to any expert while the
  /// question is still unanswered; at most one pending proposal per
  /// question.
  pub async fn request_reassignment(
    &self,
    identity: Identity,
    question_id: Uuid,
    suggested_subdomain_id: Uuid,
    reason: String,
  ) -> Result<ReassignmentRequest> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "reassignment requests" });
    }
    let question = self.fetch_question(question_id).await?;
    if !question.status.is_unanswered() {
      return Err(Error::QuestionAlreadyAnswered(question_id));
    }
    let target = self.get_subdomain(suggested_subdomain_id).await?;
    if !target.is_active {
      return Err(Error::SubdomainInactive(suggested_subdomain_id));
    }
    if let Some(pending) =
      self.store().pending_reassignment_for(question_id).await?
    {
      tracing::debug!(request = %pending.request_id, "pending request exists");
      return Err(Error::ReassignmentPending(question_id));
    }

    let request = ReassignmentRequest {
      request_id:             Uuid::new_v4(),
      question_id,
      requested_by:           identity.actor,
      current_subdomain_id:   question.subdomain_id,
      suggested_subdomain_id,
      reason,
      status:                 ReassignmentStatus::Pending,
      reviewed_by:            None,
      admin_notes:            None,
      created_at:             Utc::now(),
      reviewed_at:            None,
    };
    self.store().insert_reassignment(&request).await?;
    Ok(request)
  }

  pub async fn get_reassignment(&self, id: Uuid) -> Result<ReassignmentRequest> {
    self
      .store()
      .get_reassignment(id)
      .await?
      .ok_or(Error::RequestNotFound(id))
  }

  pub async fn list_reassignments(
    &self,
    status: Option<ReassignmentStatus>,
    page: &PageRequest,
  ) -> Result<Page<ReassignmentRequest>> {
    self.store().list_reassignments(status, page).await
  }

  /// Admin review. Approval re-routes the question atomically with the
  /// request row and starts a fresh SLA window; rejection leaves the
  /// question untouched. Terminal either way.
  pub async fn review_reassignment(
    &self,
    identity: Identity,
    request_id: Uuid,
    approve: bool,
    admin_notes: Option<String>,
  ) -> Result<(ReassignmentRequest, Option<Question>)> {
    if !identity.is_admin() {
      return Err(Error::AdminOnly { action: "reassignment review" });
    }
    let (request, question) = self
      .store()
      .review_reassignment(
        request_id,
        approve,
        admin_notes.as_deref(),
        identity.actor,
        Utc::now(),
      )
      .await?;

    tracing::info!(
      request = %request_id,
      approved = approve,
      "reassignment reviewed"
    );
    Ok((request, question))
  }
}

fn unrouted() -> RouteDecision {
  RouteDecision { subdomain_id: None, origin: RouteOrigin::Unrouted }
}

#[cfg(test)]
mod tests {
  use quill_core::{
    question::{QuestionStatus, RouteOrigin},
    routing::{NewSubDomain, ReassignmentStatus},
  };
  use uuid::Uuid;

  use crate::testutil::{
    admin, expert, mem_engine, submit_plain, StaticModel,
  };

  #[tokio::test]
  async fn supplied_subdomain_is_honoured_verbatim() {
    let engine = mem_engine(StaticModel::default()).await;
    let sd = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "network".into(), sla_hours: 24, is_active: true },
      )
      .await
      .unwrap();

    let outcome = engine
      .submit(
        quill_core::identity::Identity::requester(Uuid::new_v4()),
        quill_core::question::NewQuestion {
          text:            "Why does the VPN drop?".into(),
          subdomain_id:    Some(sd.subdomain_id),
          category:        None,
          priority:        Default::default(),
          turbo_mode:      false,
          turbo_threshold: None,
        },
      )
      .await
      .unwrap();

    assert_eq!(outcome.question.subdomain_id, Some(sd.subdomain_id));
    assert!(matches!(
      outcome.question.routing_origin,
      RouteOrigin::Human
    ));
  }

  #[tokio::test]
  async fn inactive_subdomain_rejects_submission() {
    let engine = mem_engine(StaticModel::default()).await;
    let sd = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "legacy".into(), sla_hours: 24, is_active: false },
      )
      .await
      .unwrap();

    let err = engine
      .submit(
        quill_core::identity::Identity::requester(Uuid::new_v4()),
        quill_core::question::NewQuestion {
          text:            "anything".into(),
          subdomain_id:    Some(sd.subdomain_id),
          category:        None,
          priority:        Default::default(),
          turbo_mode:      false,
          turbo_threshold: None,
        },
      )
      .await
      .unwrap_err();
    assert!(matches!(err, quill_core::Error::SubdomainInactive(_)));
  }

  #[tokio::test]
  async fn confident_classification_routes_with_model_origin() {
    let engine = mem_engine(StaticModel::default()).await;
    let sd = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "network".into(), sla_hours: 24, is_active: true },
      )
      .await
      .unwrap();
    // Point the stub classifier at the pool.
    let engine = engine.reclassify_to(sd.subdomain_id, 0.8);

    let outcome = submit_plain(&engine, "network is down").await;
    assert_eq!(outcome.question.subdomain_id, Some(sd.subdomain_id));
    assert!(matches!(
      outcome.question.routing_origin,
      RouteOrigin::Model { confidence } if (confidence - 0.8).abs() < 1e-9
    ));
  }

  #[tokio::test]
  async fn weak_classification_falls_back_to_category_queue() {
    let engine = mem_engine(StaticModel::default()).await;
    let sd = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "network".into(), sla_hours: 24, is_active: true },
      )
      .await
      .unwrap();
    let engine = engine.reclassify_to(sd.subdomain_id, 0.3);

    let outcome = submit_plain(&engine, "something unrelated").await;
    assert_eq!(outcome.question.subdomain_id, None);
    assert!(matches!(
      outcome.question.routing_origin,
      RouteOrigin::Unrouted
    ));
    assert_eq!(outcome.question.status, QuestionStatus::ExpertQueue);
  }

  #[tokio::test]
  async fn reassignment_approval_moves_and_terminates() {
    let engine = mem_engine(StaticModel::default()).await;
    let from = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "network".into(), sla_hours: 24, is_active: true },
      )
      .await
      .unwrap();
    let to = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "storage".into(), sla_hours: 8, is_active: true },
      )
      .await
      .unwrap();

    let outcome = engine
      .submit(
        quill_core::identity::Identity::requester(Uuid::new_v4()),
        quill_core::question::NewQuestion {
          text:            "disks full on the NAS".into(),
          subdomain_id:    Some(from.subdomain_id),
          category:        None,
          priority:        Default::default(),
          turbo_mode:      false,
          turbo_threshold: None,
        },
      )
      .await
      .unwrap();
    let qid = outcome.question.question_id;

    let request = engine
      .request_reassignment(
        expert(),
        qid,
        to.subdomain_id,
        "storage expertise needed".into(),
      )
      .await
      .unwrap();

    // Filing does not touch routing.
    let q = engine.get_question(qid).await.unwrap();
    assert_eq!(q.subdomain_id, Some(from.subdomain_id));

    // A second pending request is refused.
    let err = engine
      .request_reassignment(expert(), qid, to.subdomain_id, "me too".into())
      .await
      .unwrap_err();
    assert!(matches!(err, quill_core::Error::ReassignmentPending(_)));

    let (reviewed, moved) = engine
      .review_reassignment(admin(), request.request_id, true, None)
      .await
      .unwrap();
    assert_eq!(reviewed.status, ReassignmentStatus::Approved);
    let moved = moved.unwrap();
    assert_eq!(moved.subdomain_id, Some(to.subdomain_id));

    // Terminal once reviewed.
    let err = engine
      .review_reassignment(admin(), request.request_id, false, None)
      .await
      .unwrap_err();
    assert!(matches!(err, quill_core::Error::AlreadyReviewed(_)));
  }

  #[tokio::test]
  async fn review_is_admin_only() {
    let engine = mem_engine(StaticModel::default()).await;
    let err = engine
      .review_reassignment(expert(), Uuid::new_v4(), true, None)
      .await
      .unwrap_err();
    assert!(matches!(err, quill_core::Error::AdminOnly { .. }));
  }

  #[tokio::test]
  async fn answered_questions_cannot_be_reassigned() {
    let engine = mem_engine(StaticModel::default()).await;
    let to = engine
      .create_subdomain(
        admin(),
        NewSubDomain { name: "storage".into(), sla_hours: 8, is_active: true },
      )
      .await
      .unwrap();

    let outcome = submit_plain(&engine, "please help with the NAS").await;
    let qid = outcome.question.question_id;
    let e = expert();
    engine.assign(e, qid).await.unwrap();
    engine
      .submit_answer(
        e,
        qid,
        "Expand the volume.".into(),
        quill_core::answer::AnswerSource::Expert,
      )
      .await
      .unwrap();

    let err = engine
      .request_reassignment(expert(), qid, to.subdomain_id, "late".into())
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      quill_core::Error::QuestionAlreadyAnswered(_)
    ));
  }
}
