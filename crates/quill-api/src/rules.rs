//! Handlers for the automation-rule admin surface.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use quill_core::{
  automation::{AutomationRule, NewAutomationRule},
  model::SemanticModel,
  store::TriageStore,
};
use quill_engine::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{claims::Claims, error::ApiError, questions::page_request};

/// A rule together with its computed acceptance rate.
#[derive(Debug, Serialize)]
pub struct RuleWithStats {
  #[serde(flatten)]
  pub rule:            AutomationRule,
  pub acceptance_rate: Option<f64>,
}

impl From<AutomationRule> for RuleWithStats {
  fn from(rule: AutomationRule) -> Self {
    let acceptance_rate = rule.acceptance_rate();
    Self { rule, acceptance_rate }
  }
}

/// `POST /rules` — admin; returns 201.
pub async fn create<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Json(body): Json<NewAutomationRule>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let rule = engine.create_rule(identity, body).await?;
  Ok((StatusCode::CREATED, Json(RuleWithStats::from(rule))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /rules` — each rule with its acceptance-rate analytics.
pub async fn list<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<quill_core::page::Page<RuleWithStats>>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let page = page_request(params.page, params.page_size);
  let rules = engine.list_rules(&page).await?;
  Ok(Json(quill_core::page::Page {
    items:     rules.items.into_iter().map(RuleWithStats::from).collect(),
    total:     rules.total,
    page:      rules.page,
    page_size: rules.page_size,
  }))
}

/// `POST /rules/:id/enable`
pub async fn enable<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<RuleWithStats>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let rule = engine.set_rule_enabled(identity, id, true).await?;
  Ok(Json(RuleWithStats::from(rule)))
}

/// `POST /rules/:id/disable`
pub async fn disable<S, M>(
  State(engine): State<Arc<Engine<S, M>>>,
  Claims(identity): Claims,
  Path(id): Path<Uuid>,
) -> Result<Json<RuleWithStats>, ApiError>
where
  S: TriageStore,
  M: SemanticModel,
{
  let rule = engine.set_rule_enabled(identity, id, false).await?;
  Ok(Json(RuleWithStats::from(rule)))
}
