//! JSON REST API for the Quill triage engine.
//!
//! Exposes an axum [`Router`] backed by any [`TriageStore`] +
//! [`SemanticModel`] pair. Auth, TLS, and transport concerns are the
//! caller's responsibility; identity arrives as proxy-injected claim
//! headers (see [`claims`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", quill_api::api_router(engine.clone()))
//! ```

pub mod claims;
pub mod documents;
pub mod error;
pub mod facts;
pub mod questions;
pub mod reassignments;
pub mod rules;
pub mod subdomains;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use quill_core::{model::SemanticModel, store::TriageStore};
use quill_engine::Engine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M>(engine: Arc<Engine<S, M>>) -> Router<()>
where
  S: TriageStore + 'static,
  M: SemanticModel + 'static,
{
  Router::new()
    // Questions & expert actions
    .route(
      "/questions",
      post(questions::submit::<S, M>).get(questions::list::<S, M>),
    )
    .route("/questions/{id}", get(questions::get_one::<S, M>))
    .route("/questions/{id}/answers", get(questions::answers::<S, M>))
    .route("/questions/{id}/assign", post(questions::assign::<S, M>))
    .route("/questions/{id}/answer", post(questions::answer::<S, M>))
    .route("/questions/{id}/clarify", post(questions::clarify::<S, M>))
    .route("/questions/{id}/clarified", post(questions::clarified::<S, M>))
    .route("/questions/{id}/accept", post(questions::accept::<S, M>))
    .route("/questions/{id}/reject", post(questions::reject::<S, M>))
    .route("/questions/{id}/rate", post(questions::rate::<S, M>))
    .route("/questions/{id}/close", post(questions::close::<S, M>))
    // Reassignment
    .route(
      "/questions/{id}/reassignment",
      post(reassignments::request::<S, M>),
    )
    .route("/reassignments", get(reassignments::list::<S, M>))
    .route(
      "/reassignments/{id}/review",
      post(reassignments::review::<S, M>),
    )
    // Knowledge store
    .route("/facts", post(facts::create::<S, M>).get(facts::list::<S, M>))
    .route("/facts/{id}", get(facts::get_one::<S, M>))
    .route("/facts/{id}/tier", post(facts::set_tier::<S, M>))
    .route("/facts/{id}/archive", post(facts::archive::<S, M>))
    .route("/search", get(facts::search::<S, M>))
    // Documents & candidates
    .route(
      "/documents",
      post(documents::upload::<S, M>).get(documents::list::<S, M>),
    )
    .route("/documents/{id}", get(documents::get_one::<S, M>))
    .route("/documents/{id}/parse", post(documents::parse::<S, M>))
    .route("/documents/{id}/extract", post(documents::extract::<S, M>))
    .route(
      "/documents/{id}/candidates",
      get(documents::candidates::<S, M>),
    )
    .route(
      "/documents/{id}/bulk-approve",
      post(documents::bulk_approve::<S, M>),
    )
    .route("/candidates/{id}/approve", post(documents::approve::<S, M>))
    .route("/candidates/{id}/reject", post(documents::reject::<S, M>))
    .route("/candidates/{id}/review", post(documents::review::<S, M>))
    // Sub-domains
    .route(
      "/subdomains",
      post(subdomains::create::<S, M>).get(subdomains::list::<S, M>),
    )
    .route(
      "/subdomains/{id}",
      get(subdomains::get_one::<S, M>).patch(subdomains::update::<S, M>),
    )
    .route(
      "/subdomains/{id}/experts",
      post(subdomains::add_expert::<S, M>).get(subdomains::experts::<S, M>),
    )
    .route(
      "/subdomains/{id}/experts/{expert_id}",
      delete(subdomains::remove_expert::<S, M>),
    )
    // Automation rules
    .route("/rules", post(rules::create::<S, M>).get(rules::list::<S, M>))
    .route("/rules/{id}/enable", post(rules::enable::<S, M>))
    .route("/rules/{id}/disable", post(rules::disable::<S, M>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
  };
  use quill_engine::{Engine, EngineConfig, LexicalModel};
  use quill_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::api_router;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine =
      Arc::new(Engine::new(store, LexicalModel, EngineConfig::default()));
    api_router(engine)
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    identity: Option<(Uuid, &str)>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((actor, role)) = identity {
      builder = builder
        .header("x-quill-actor", actor.to_string())
        .header("x-quill-role", role);
    }
    let request = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn qid(outcome: &Value) -> String {
    outcome["question"]["question_id"]
      .as_str()
      .unwrap()
      .to_owned()
  }

  // ── Identity ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn submission_without_claims_is_rejected() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/questions",
      None,
      Some(json!({"text": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-quill-actor"));
  }

  // ── Submission ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn submit_returns_created_question() {
    let app = app().await;
    let requester = Uuid::new_v4();
    let (status, body) = send(
      &app,
      "POST",
      "/questions",
      Some((requester, "requester")),
      Some(json!({"text": "Why is the VPN slow?", "department": "network"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["question"]["status"], "expert_queue");
    assert_eq!(body["question"]["category"], "network");
    assert_eq!(body["auto_answered"], false);
    assert_eq!(body["turbo_answered"], false);
  }

  #[tokio::test]
  async fn empty_text_maps_to_400() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/questions",
      Some((Uuid::new_v4(), "requester")),
      Some(json!({"text": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
  }

  #[tokio::test]
  async fn unknown_question_maps_to_404() {
    let app = app().await;
    let (status, _) = send(
      &app,
      "GET",
      &format!("/questions/{}", Uuid::new_v4()),
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Expert actions ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn double_assign_maps_to_409() {
    let app = app().await;
    let (_, outcome) = send(
      &app,
      "POST",
      "/questions",
      Some((Uuid::new_v4(), "requester")),
      Some(json!({"text": "Printer refuses to print"})),
    )
    .await;
    let id = qid(&outcome);

    let (status, _) = send(
      &app,
      "POST",
      &format!("/questions/{id}/assign"),
      Some((Uuid::new_v4(), "expert")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
      &app,
      "POST",
      &format!("/questions/{id}/assign"),
      Some((Uuid::new_v4(), "expert")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
  }

  #[tokio::test]
  async fn answer_before_assignment_maps_to_422() {
    let app = app().await;
    let (_, outcome) = send(
      &app,
      "POST",
      "/questions",
      Some((Uuid::new_v4(), "requester")),
      Some(json!({"text": "Screen flickers at 60Hz"})),
    )
    .await;
    let id = qid(&outcome);

    let (status, body) = send(
      &app,
      "POST",
      &format!("/questions/{id}/answer"),
      Some((Uuid::new_v4(), "expert")),
      Some(json!({"content": "Update the driver."})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "precondition");
  }

  #[tokio::test]
  async fn rating_twice_maps_to_409() {
    let app = app().await;
    let requester = Uuid::new_v4();
    let expert = Uuid::new_v4();
    let (_, outcome) = send(
      &app,
      "POST",
      "/questions",
      Some((requester, "requester")),
      Some(json!({"text": "Laptop will not charge"})),
    )
    .await;
    let id = qid(&outcome);

    send(
      &app,
      "POST",
      &format!("/questions/{id}/assign"),
      Some((expert, "expert")),
      None,
    )
    .await;
    send(
      &app,
      "POST",
      &format!("/questions/{id}/answer"),
      Some((expert, "expert")),
      Some(json!({"content": "Replace the charger."})),
    )
    .await;

    let (status, body) = send(
      &app,
      "POST",
      &format!("/questions/{id}/rate"),
      Some((requester, "requester")),
      Some(json!({"rating": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["satisfaction_rating"], 4);

    let (status, _) = send(
      &app,
      "POST",
      &format!("/questions/{id}/rate"),
      Some((requester, "requester")),
      Some(json!({"rating": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // First value retained.
    let (_, q) =
      send(&app, "GET", &format!("/questions/{id}"), None, None).await;
    assert_eq!(q["satisfaction_rating"], 4);
  }

  // ── Admin boundaries ────────────────────────────────────────────────────

  #[tokio::test]
  async fn subdomain_creation_is_admin_only() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/subdomains",
      Some((Uuid::new_v4(), "expert")),
      Some(json!({"name": "network", "sla_hours": 24})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, body) = send(
      &app,
      "POST",
      "/subdomains",
      Some((Uuid::new_v4(), "admin")),
      Some(json!({"name": "network", "sla_hours": 24})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "network");
  }

  #[tokio::test]
  async fn fact_listing_is_paginated() {
    let app = app().await;
    let expert = Uuid::new_v4();
    for i in 0..3 {
      let (status, _) = send(
        &app,
        "POST",
        "/facts",
        Some((expert, "expert")),
        Some(json!({
          "content": format!("Fact number {i} about backups."),
          "tier": "tier_0b",
          "confidence_score": 0.8,
          "importance": 5,
          "lifetime": {"kind": "perpetual"},
        })),
      )
      .await;
      assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) =
      send(&app, "GET", "/facts?page=1&page_size=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn search_ranks_facts_lexically() {
    let app = app().await;
    let expert = Uuid::new_v4();
    send(
      &app,
      "POST",
      "/facts",
      Some((expert, "expert")),
      Some(json!({
        "content": "Database backups run nightly at 02:00.",
        "tier": "tier_0a",
        "confidence_score": 0.9,
        "importance": 7,
        "lifetime": {"kind": "perpetual"},
      })),
    )
    .await;
    send(
      &app,
      "POST",
      "/facts",
      Some((expert, "expert")),
      Some(json!({
        "content": "Office plants need watering weekly.",
        "tier": "tier_0c",
        "confidence_score": 0.5,
        "importance": 2,
        "lifetime": {"kind": "perpetual"},
      })),
    )
    .await;

    let (status, body) = send(
      &app,
      "GET",
      "/search?text=when%20do%20database%20backups%20run",
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let hits = body.as_array().unwrap();
    assert!(!hits.is_empty());
    assert!(
      hits[0]["fact"]["content"]
        .as_str()
        .unwrap()
        .contains("backups")
    );
  }
}
