//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Engine errors carry their own taxonomy; the mapping to HTTP statuses
//! lives here and nowhere else.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use quill_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] quill_core::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind, message) = match &self {
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, "validation", m.clone())
      }
      ApiError::Engine(e) => {
        let status = match e.kind() {
          ErrorKind::Validation => StatusCode::BAD_REQUEST,
          ErrorKind::Conflict => StatusCode::CONFLICT,
          ErrorKind::Precondition => StatusCode::UNPROCESSABLE_ENTITY,
          ErrorKind::NotFound => StatusCode::NOT_FOUND,
          ErrorKind::Forbidden => StatusCode::FORBIDDEN,
          ErrorKind::Upstream => StatusCode::GATEWAY_TIMEOUT,
          ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, kind_name(e.kind()), e.to_string())
      }
    };
    (status, Json(json!({ "error": message, "kind": kind }))).into_response()
  }
}

fn kind_name(kind: ErrorKind) -> &'static str {
  match kind {
    ErrorKind::Validation => "validation",
    ErrorKind::Conflict => "conflict",
    ErrorKind::Precondition => "precondition",
    ErrorKind::NotFound => "not_found",
    ErrorKind::Forbidden => "forbidden",
    ErrorKind::Upstream => "upstream_timeout",
    ErrorKind::Storage => "storage",
  }
}
