//! Handlers for the document extraction pipeline.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use quill_core::{
  document::{
    ApprovalOverrides, BulkApprovalReport, ExtractedFactCandidate,
    KnowledgeDocument, NewDocument, ValidationStatus,
  },
  model::SemanticModel,
  page::Page,
  store::TriageStore,
};
use quill_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError, questions::page_request};

// ─── Documents ───────────────────────────────────────────────────────────────

/// `POST /documents` — returns 201 + the stored document.
pub async fn upload<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Json(body): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let document = engine.upload_document(identity, body).await?;
  Ok((StatusCode::CREATED, Json(document)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /documents`
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<KnowledgeDocument>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_documents(&page).await?))
}

/// `GET /documents/:id`
pub async fn get_one<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<KnowledgeDocument>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.get_document(id).await?))
}

/// `POST /documents/:id/parse`
pub async fn parse<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(_identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<KnowledgeDocument>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.parse_document(id).await?))
}

/// `POST /documents/:id/extract` — 409 while a prior extraction runs.
pub async fn extract<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(_identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let (document, candidates) = engine.extract(id).await?;
  Ok(Json(serde_json::json!({
    "document": document,
    "candidates": candidates,
  })))
}

// ─── Candidates ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CandidateParams {
  pub status:    Option<ValidationStatus>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /documents/:id/candidates[?status=pending]`
pub async fn candidates<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
  Query(params): Query<CandidateParams>,
) -> Result<Json<Page<ExtractedFactCandidate>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_candidates(id, params.status, &page).await?))
}

/// `POST /candidates/:id/approve` — body: [`ApprovalOverrides`] (all
/// optional). Irreversible.
pub async fn approve<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<ApprovalOverrides>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let (candidate, fact) = engine.approve_candidate(identity, id, body).await?;
  Ok(Json(serde_json::json!({
    "candidate": candidate,
    "fact": fact,
  })))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: String,
}

/// `POST /candidates/:id/reject` — terminal, with a reason.
pub async fn reject<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<ExtractedFactCandidate>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.reject_candidate(identity, id, body.reason).await?))
}

/// `POST /candidates/:id/review` — flag for a second pair of eyes.
pub async fn review<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<ExtractedFactCandidate>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.flag_candidate(identity, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkApproveBody {
  pub min_confidence: f64,
}

/// `POST /documents/:id/bulk-approve` — body: `{"min_confidence":0.7}`.
pub async fn bulk_approve<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<BulkApproveBody>,
) -> Result<Json<BulkApprovalReport>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.bulk_approve(identity, id, body.min_confidence).await?))
}
