//! Handlers for sub-domain administration and expert membership.

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
  routing::{NewSubDomain, SubDomain, SubDomainPatch},
  store::TriageStore,
};
use quill_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError, questions::page_request};

/// `POST /subdomains` — admin; returns 201.
pub async fn create<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Json(body): Json<NewSubDomain>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let subdomain = engine.create_subdomain(identity, body).await?;
  Ok((StatusCode::CREATED, Json(subdomain)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /subdomains`
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<SubDomain>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_subdomains(&page).await?))
}

/// `GET /subdomains/:id`
pub async fn get_one<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SubDomain>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.get_subdomain(id).await?))
}

/// `PATCH /subdomains/:id` — admin; partial update.
pub async fn update<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<SubDomainPatch>,
) -> Result<Json<SubDomain>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.update_subdomain(identity, id, body).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExpertBody {
  pub expert_id: Uuid,
}

/// `POST /subdomains/:id/experts` — admin; idempotent add.
pub async fn add_expert<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<ExpertBody>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.add_subdomain_expert(identity, id, body.expert_id).await?))
}

/// `GET /subdomains/:id/experts`
pub async fn experts<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.list_subdomain_experts(id).await?))
}

/// `DELETE /subdomains/:id/experts/:expert_id` — admin.
pub async fn remove_expert<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path((id, expert_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.remove_subdomain_expert(identity, id, expert_id).await?))
}
