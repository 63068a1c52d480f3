//! Handlers for `/facts` and `/search`.

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
  store::TriageStore,
  wisdom::{FactTier, NewWisdomFact, WisdomFact},
};
use quill_engine::{Engine, knowledge::RankedFact};
use serde::Deserialize;
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError, questions::page_request};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /facts` — expert authoring; returns 201 + the stored fact.
pub async fn create<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Json(body): Json<NewWisdomFact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let fact = engine.author_fact(identity, body).await?;
  Ok((StatusCode::CREATED, Json(fact)))
}

// ─── List / get ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tier:      Option<FactTier>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /facts[?tier=tier_0a][&page=...]`
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<WisdomFact>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  Ok(Json(engine.list_facts(params.tier, &page).await?))
}

/// `GET /facts/:id`
pub async fn get_one<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<WisdomFact>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.get_fact(id).await?))
}

// ─── Tier actions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TierBody {
  pub tier: FactTier,
}

/// `POST /facts/:id/tier` — explicit promote/demote.
pub async fn set_tier<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
  Json(body): Json<TierBody>,
) -> Result<Json<WisdomFact>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.set_fact_tier(identity, id, body.tier).await?))
}

/// `POST /facts/:id/archive` — manual soft-delete.
pub async fn archive<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<WisdomFact>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  Ok(Json(engine.archive_fact(identity, id).await?))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub text:  String,
  pub limit: Option<usize>,
}

/// `GET /search?text=...[&limit=20]` — ranked non-archived facts.
pub async fn search<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<RankedFact>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let limit = params.limit.unwrap_or(20).min(100);
  Ok(Json(engine.search_facts(&params.text, limit).await?))
}
