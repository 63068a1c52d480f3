//! Handlers for the reassignment workflow.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use quill_core::{
  model::SemanticModel,
  page::Page,
  routing::{ReassignmentRequest, ReassignmentStatus},
  store::TriageStore,
};
use quill_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError, questions::page_request};

#[derive(Debug, Deserialize)]
pub struct RequestBody {
  pub suggested_subdomain_id: Uuid,
  pub reason:                 String,
}

/// `POST /questions/:id/reassignment` — expert files a proposal; does not
/// itself change routing.
pub async fn request<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(question_id): Path<Uuid>,
  Json(body): Json<RequestBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let request = engine
    .request_reassignment(
      identity,
      question_id,
      body.suggested_subdomain_id,
      body.reason,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:    Option<ReassignmentStatus>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /reassignments[?status=pending]`
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<ReassignmentRequest>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_reassignments(params.status, &page).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub approved:    bool,
  pub admin_notes: Option<String>,
}

/// `POST /reassignments/:id/review` — admin; approval moves the question
/// atomically, rejection leaves it alone, and either way the request is
/// terminal.
pub async fn review<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let (request, question) = engine
    .review_reassignment(identity, id, body.approved, body.admin_notes)
    .await?;
  Ok(Json(serde_json::json!({
    "request": request,
    "question": question,
  })))
}
