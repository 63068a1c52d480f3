//! Handlers for `/questions` — submission, the queue, and expert actions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/questions` | Body: [`NewQuestion`]; runs both automated paths synchronously |
//! | `GET`  | `/questions` | Queue listing; filter by status/category/priority, paginated |
//! | `GET`  | `/questions/:id` | Single question |
//! | `GET`  | `/questions/:id/answers` | Full answer history |
//! | `POST` | `/questions/:id/assign` etc. | Expert actions; conflicts refuse, repeats no-op |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use quill_core::{
  answer::{Answer, AnswerSource},
  model::SemanticModel,
  page::{Page, PageRequest},
  question::{NewQuestion, Priority, Question, QuestionStatus},
  store::{QuestionFilter, TriageStore},
};
use quill_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError};

// ─── Submit ──────────────────────────────────────────────────────────────────

/// `POST /questions` — returns 201 + the submission outcome.
pub async fn submit<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Json(body): Json<NewQuestion>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let outcome = engine.submit(identity, body).await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Queue listing ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueueParams {
  pub status:       Option<QuestionStatus>,
  pub category:     Option<String>,
  pub priority:     Option<Priority>,
  pub subdomain_id: Option<Uuid>,
  pub assigned_to:  Option<Uuid>,
  pub page:         Option<u32>,
  pub page_size:    Option<u32>,
}

pub(crate) fn page_request(
  page: Option<u32>,
  page_size: Option<u32>,
) -> PageRequest {
  let default = PageRequest::default();
  PageRequest {
    page:      page.unwrap_or(default.page),
    page_size: page_size.unwrap_or(default.page_size),
  }
}

/// `GET /questions[?status=...][&category=...][&priority=...][&page=...]`
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<QueueParams>,
) -> Result<Json<Page<Question>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let filter = QuestionFilter {
    status:       params.status,
    category:     params.category,
    priority:     params.priority,
    subdomain_id: params.subdomain_id,
    assigned_to:  params.assigned_to,
  };
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_questions(&filter, &page).await?))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /questions/:id`
pub async fn get_one<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.get_question(id).await?))
}

/// `GET /questions/:id/answers`
pub async fn answers<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Answer>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.list_answers(id).await?))
}

// ─── Expert actions ──────────────────────────────────────────────────────────

/// `POST /questions/:id/assign`
pub async fn assign<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.assign(identity, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
  pub content: String,
  #[serde(default = "default_source")]
  pub source:  AnswerSource,
}

fn default_source() -> AnswerSource { AnswerSource::Expert }

/// `POST /questions/:id/answer` — body: `{"content":"...","source":"expert"}`
pub async fn answer<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let (question, answer) = engine
    .submit_answer(identity, id, body.content, body.source)
    .await?;
  Ok(Json(serde_json::json!({
    "question": question,
    "answer": answer,
  })))
}

/// `POST /questions/:id/clarify`
pub async fn clarify<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.request_clarification(identity, id).await?))
}

/// `POST /questions/:id/clarified`
pub async fn clarified<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.provide_clarification(identity, id).await?))
}

/// `POST /questions/:id/accept`
pub async fn accept<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.accept_auto_answer(identity, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: Option<String>,
}

/// `POST /questions/:id/reject` — body: `{"reason":"..."}` (optional)
pub async fn reject<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.reject_auto_answer(identity, id, body.reason).await?))
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
  pub rating: u8,
}

/// `POST /questions/:id/rate` — body: `{"rating":4}`; write-once.
pub async fn rate<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<RateBody>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.rate(identity, id, body.rating).await?))
}

/// `POST /questions/:id/close` — admin.
pub async fn close<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.close(identity, id).await?))
}
