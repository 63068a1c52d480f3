//! DocumentExtractionPipeline — upload, parse, extract, validate.
//!
//! Parsing and extraction are independent per-document state machines;
//! extraction is gated on parsing completion and refuses to run twice
//! concurrently for the same document. Candidate validation is the experts'
//! asynchronous job: approval is irreversible and creates exactly one fact.

use chrono::Utc;
use quill_core::{
  Error, Result,
  document::{
    ApprovalOverrides, BulkApprovalError, BulkApprovalReport,
    ExtractedFactCandidate, ExtractionStatus, KnowledgeDocument,
    NewDocument, ParsingStatus, ValidationStatus,
  },
  identity::Identity,
  model::SemanticModel,
  page::{Page, PageRequest},
  store::TriageStore,
  wisdom::{FactTier, WisdomFact},
};
use uuid::Uuid;

use crate::{Engine, knowledge::validate_fact_numbers};

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  pub async fn upload_document(
    &self,
    identity: Identity,
    input: NewDocument,
  ) -> Result<KnowledgeDocument> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "document upload" });
    }
    let document = KnowledgeDocument {
      document_id:           Uuid::new_v4(),
      title:                 input.title,
      content:               input.content,
      parsed_text:           None,
      parsing_status:        ParsingStatus::Pending,
      extraction_status:     ExtractionStatus::Pending,
      extracted_facts_count: 0,
      validated_facts_count: 0,
      lifetime:              input.lifetime,
      auto_delete_on_expiry: input.auto_delete_on_expiry,
      uploaded_by:           identity.actor,
      created_at:            Utc::now(),
    };
    self.store().insert_document(&document).await?;
    Ok(document)
  }

  pub async fn get_document(&self, id: Uuid) -> Result<KnowledgeDocument> {
    self
      .store()
      .get_document(id)
      .await?
      .ok_or(Error::DocumentNotFound(id))
  }

  pub async fn list_documents(
    &self,
    page: &PageRequest,
  ) -> Result<Page<KnowledgeDocument>> {
    self.store().list_documents(page).await
  }

  /// Run the black-box parser over the raw content. A parser failure marks
  /// the document `failed` and is reported through the returned document,
  /// not as an engine error — the upload itself survives.
  pub async fn parse_document(&self, id: Uuid) -> Result<KnowledgeDocument> {
    let document = self.get_document(id).await?;
    let document = self
      .store()
      .set_parsing_status(
        document.document_id,
        &[ParsingStatus::Pending, ParsingStatus::Failed],
        ParsingStatus::Processing,
        None,
      )
      .await?;

    match self
      .guarded(
        "document parsing",
        self.model().parse_document(&document.content),
      )
      .await
    {
      Ok(text) => {
        self
          .store()
          .set_parsing_status(
            id,
            &[ParsingStatus::Processing],
            ParsingStatus::Completed,
            Some(&text),
          )
          .await
      }
      Err(e) => {
        tracing::warn!(document = %id, error = %e, "parsing failed");
        self
          .store()
          .set_parsing_status(
            id,
            &[ParsingStatus::Processing],
            ParsingStatus::Failed,
            None,
          )
          .await
      }
    }
  }

  /// Produce candidates from parsed text. Fails with a precondition error
  /// until parsing completed, and with a conflict while another extraction
  /// of the same document runs. Each candidate row persists independently:
  /// one bad row downgrades the run to `partial` without aborting the rest.
  pub async fn extract(
    &self,
    id: Uuid,
  ) -> Result<(KnowledgeDocument, Vec<ExtractedFactCandidate>)> {
    let document = self.get_document(id).await?;
    if document.parsing_status != ParsingStatus::Completed {
      return Err(Error::ParsingIncomplete(id));
    }
    let document = self.store().begin_extraction(id).await?;
    let text = document.parsed_text.clone().unwrap_or_default();

    let drafts = match self
      .guarded("candidate extraction", self.model().extract_candidates(&text))
      .await
    {
      Ok(drafts) => drafts,
      Err(e) => {
        tracing::warn!(document = %id, error = %e, "extraction failed");
        let document = self
          .store()
          .finish_extraction(id, ExtractionStatus::Failed, 0)
          .await?;
        return Ok((document, Vec::new()));
      }
    };

    let now = Utc::now();
    let mut stored = Vec::with_capacity(drafts.len());
    let mut failures = 0u64;
    for draft in drafts {
      let candidate = ExtractedFactCandidate {
        candidate_id:          Uuid::new_v4(),
        document_id:           id,
        fact_text:             draft.fact_text,
        extraction_confidence: draft.confidence.clamp(0.0, 1.0),
        validation_status:     ValidationStatus::Pending,
        rejection_reason:      None,
        created_at:            now,
      };
      match self.store().insert_candidate(&candidate).await {
        Ok(()) => stored.push(candidate),
        Err(e) => {
          failures += 1;
          tracing::warn!(document = %id, error = %e, "candidate dropped");
        }
      }
    }

    let status = match (stored.is_empty(), failures) {
      (_, 0) => ExtractionStatus::Completed,
      (false, _) => ExtractionStatus::Partial,
      (true, _) => ExtractionStatus::Failed,
    };
    let document = self
      .store()
      .finish_extraction(id, status, stored.len() as i64)
      .await?;
    Ok((document, stored))
  }

  pub async fn list_candidates(
    &self,
    document_id: Uuid,
    status: Option<ValidationStatus>,
    page: &PageRequest,
  ) -> Result<Page<ExtractedFactCandidate>> {
    self.get_document(document_id).await?;
    self.store().list_candidates(document_id, status, page).await
  }

  /// Approve a candidate into the knowledge store. Irreversible; creates
  /// exactly one fact with `source_document_id` set.
  pub async fn approve_candidate(
    &self,
    identity: Identity,
    candidate_id: Uuid,
    overrides: ApprovalOverrides,
  ) -> Result<(ExtractedFactCandidate, WisdomFact)> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "candidate approval" });
    }
    let candidate = self
      .store()
      .get_candidate(candidate_id)
      .await?
      .ok_or(Error::CandidateNotFound(candidate_id))?;
    let document = self.get_document(candidate.document_id).await?;

    let confidence = overrides
      .confidence_score
      .unwrap_or(candidate.extraction_confidence);
    let importance = overrides.importance.unwrap_or(5);
    validate_fact_numbers(confidence, importance)?;

    let fact = WisdomFact {
      fact_id:            Uuid::new_v4(),
      content:            overrides
        .content
        .unwrap_or_else(|| candidate.fact_text.clone()),
      // Extraction-sourced facts enter at the lowest trust tier unless the
      // approving expert says otherwise.
      tier:               overrides.tier.unwrap_or(FactTier::Tier0c),
      confidence_score:   confidence,
      importance,
      lifetime:           overrides.lifetime.unwrap_or(document.lifetime),
      usage_count:        0,
      last_used_at:       None,
      source_answer_id:   None,
      source_document_id: Some(candidate.document_id),
      created_at:         Utc::now(),
    };

    let candidate = self
      .store()
      .approve_candidate(candidate_id, &fact)
      .await?;
    Ok((candidate, fact))
  }

  pub async fn reject_candidate(
    &self,
    identity: Identity,
    candidate_id: Uuid,
    reason: String,
  ) -> Result<ExtractedFactCandidate> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "candidate rejection" });
    }
    self.store().reject_candidate(candidate_id, &reason).await
  }

  pub async fn flag_candidate(
    &self,
    identity: Identity,
    candidate_id: Uuid,
  ) -> Result<ExtractedFactCandidate> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "candidate review" });
    }
    self.store().flag_candidate(candidate_id).await
  }

  /// Approve every pending candidate at or above `min_confidence` in one
  /// pass. Approvals are independent: a failure is reported per candidate
  /// and never aborts the remainder.
  pub async fn bulk_approve(
    &self,
    identity: Identity,
    document_id: Uuid,
    min_confidence: f64,
  ) -> Result<BulkApprovalReport> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "bulk approval" });
    }
    if !(0.0..=1.0).contains(&min_confidence) {
      return Err(Error::ConfidenceOutOfRange(min_confidence));
    }
    self.get_document(document_id).await?;

    let pending = self.store().pending_candidates(document_id).await?;
    let mut report = BulkApprovalReport { approved: 0, errors: Vec::new() };

    for candidate in pending {
      if candidate.extraction_confidence < min_confidence {
        continue;
      }
      match self
        .approve_candidate(
          identity,
          candidate.candidate_id,
          ApprovalOverrides::default(),
        )
        .await
      {
        Ok(_) => report.approved += 1,
        Err(e) => report.errors.push(BulkApprovalError {
          candidate_id: candidate.candidate_id,
          error:        e.to_string(),
        }),
      }
    }
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use quill_core::{
    document::{ApprovalOverrides, ExtractionStatus, ValidationStatus},
    identity::Identity,
    wisdom::{FactTier, Lifetime},
  };
  use uuid::Uuid;

  use crate::testutil::{expert, mem_engine, upload, StaticModel};

  #[tokio::test]
  async fn extract_requires_completed_parsing() {
    let engine = mem_engine(StaticModel::default()).await;
    let doc = upload(&engine, "Keys rotate quarterly. Tokens expire daily.")
      .await;

    let err = engine.extract(doc.document_id).await.unwrap_err();
    assert!(matches!(err, quill_core::Error::ParsingIncomplete(_)));
  }

  #[tokio::test]
  async fn parse_then_extract_produces_pending_candidates() {
    let engine = mem_engine(StaticModel {
      drafts: vec![(0.8, "Keys rotate quarterly."), (0.5, "Tokens expire.")],
      ..StaticModel::default()
    })
    .await;
    let doc = upload(&engine, "Keys rotate quarterly. Tokens expire daily.")
      .await;

    let parsed = engine.parse_document(doc.document_id).await.unwrap();
    assert_eq!(
      parsed.parsing_status,
      quill_core::document::ParsingStatus::Completed
    );

    let (doc2, candidates) = engine.extract(doc.document_id).await.unwrap();
    assert_eq!(doc2.extraction_status, ExtractionStatus::Completed);
    assert_eq!(doc2.extracted_facts_count, 2);
    assert_eq!(candidates.len(), 2);
    assert!(
      candidates
        .iter()
        .all(|c| c.validation_status == ValidationStatus::Pending)
    );
  }

  #[tokio::test]
  async fn bulk_approve_honours_the_confidence_floor() {
    let engine = mem_engine(StaticModel {
      drafts: vec![
        (0.9, "a one"),
        (0.8, "b two"),
        (0.7, "c three"),
        (0.6, "d four"),
        (0.5, "e five"),
      ],
      ..StaticModel::default()
    })
    .await;
    let doc = upload(&engine, "ignored").await;
    engine.parse_document(doc.document_id).await.unwrap();
    engine.extract(doc.document_id).await.unwrap();

    let report = engine
      .bulk_approve(expert(), doc.document_id, 0.7)
      .await
      .unwrap();
    assert_eq!(report.approved, 3);
    assert!(report.errors.is_empty());

    // Exactly 3 approved, 2 still pending, 3 facts with provenance set.
    let approved = engine
      .list_candidates(
        doc.document_id,
        Some(ValidationStatus::Approved),
        &Default::default(),
      )
      .await
      .unwrap();
    assert_eq!(approved.total, 3);
    let pending = engine
      .list_candidates(
        doc.document_id,
        Some(ValidationStatus::Pending),
        &Default::default(),
      )
      .await
      .unwrap();
    assert_eq!(pending.total, 2);

    let facts = engine.list_facts(None, &Default::default()).await.unwrap();
    assert_eq!(facts.total, 3);
    assert!(
      facts
        .items
        .iter()
        .all(|f| f.source_document_id == Some(doc.document_id))
    );

    let doc2 = engine.get_document(doc.document_id).await.unwrap();
    assert_eq!(doc2.validated_facts_count, 3);
  }

  #[tokio::test]
  async fn approval_applies_overrides_and_is_terminal() {
    let engine = mem_engine(StaticModel {
      drafts: vec![(0.8, "Keys rotate quarterly.")],
      ..StaticModel::default()
    })
    .await;
    let doc = upload(&engine, "ignored").await;
    engine.parse_document(doc.document_id).await.unwrap();
    let (_, candidates) = engine.extract(doc.document_id).await.unwrap();

    let (candidate, fact) = engine
      .approve_candidate(
        expert(),
        candidates[0].candidate_id,
        ApprovalOverrides {
          tier: Some(FactTier::Tier0a),
          lifetime: Some(Lifetime::Perpetual),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(candidate.validation_status, ValidationStatus::Approved);
    assert_eq!(fact.tier, FactTier::Tier0a);
    assert_eq!(fact.source_document_id, Some(doc.document_id));

    let err = engine
      .reject_candidate(expert(), candidate.candidate_id, "no".into())
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      quill_core::Error::CandidateAlreadyValidated(_)
    ));
  }

  #[tokio::test]
  async fn non_expert_cannot_touch_the_pipeline() {
    let engine = mem_engine(StaticModel::default()).await;
    let requester = Identity::requester(Uuid::new_v4());
    let err = engine
      .bulk_approve(requester, Uuid::new_v4(), 0.5)
      .await
      .unwrap_err();
    assert!(matches!(err, quill_core::Error::ExpertOnly { .. }));
  }
}
