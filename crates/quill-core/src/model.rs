//! The black-box semantic model seam.
//!
//! The engine never assumes anything about how similarity, classification,
//! parsing, or extraction work — only the input/output contract below. Every
//! call made on a request path runs under a timeout; a failure or timeout
//! degrades to the safe default (no match, unrouted) rather than failing the
//! primary operation.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::{routing::SubDomain, wisdom::WisdomFact};

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// Per-fact similarity against a query text, 0–1.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFact {
  pub fact_id:    Uuid,
  pub similarity: f64,
}

/// A classifier's sub-domain pick with its confidence, 0–1.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
  pub subdomain_id: Uuid,
  pub confidence:   f64,
}

/// A fact candidate proposed by the extractor, before persistence.
#[derive(Debug, Clone)]
pub struct CandidateDraft {
  pub fact_text:  String,
  pub confidence: f64,
}

// ─── Error ───────────────────────────────────────────────────────────────────

/// Opaque failure from the model backend. The engine logs it and degrades.
#[derive(Debug, thiserror::Error)]
#[error("semantic model error: {0}")]
pub struct ModelError(pub String);

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Contract for the external language-understanding backend.
///
/// All methods return `Send` futures so implementations may call out over
/// the network from a multi-threaded runtime.
pub trait SemanticModel: Send + Sync {
  /// Symmetric text similarity, 0–1.
  fn similarity<'a>(
    &'a self,
    a: &'a str,
    b: &'a str,
  ) -> impl Future<Output = Result<f64, ModelError>> + Send + 'a;

  /// Score each fact against the query text. Implementations return one
  /// entry per input fact; ordering is not significant.
  fn score_facts<'a>(
    &'a self,
    text: &'a str,
    facts: &'a [WisdomFact],
  ) -> impl Future<Output = Result<Vec<ScoredFact>, ModelError>> + Send + 'a;

  /// Pick the best-fitting sub-domain, or `None` when nothing fits at all.
  fn classify<'a>(
    &'a self,
    text: &'a str,
    options: &'a [SubDomain],
  ) -> impl Future<Output = Result<Option<Classification>, ModelError>> + Send + 'a;

  /// Turn raw uploaded document content into clean text.
  fn parse_document<'a>(
    &'a self,
    raw: &'a str,
  ) -> impl Future<Output = Result<String, ModelError>> + Send + 'a;

  /// Propose fact candidates from parsed document text.
  fn extract_candidates<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<CandidateDraft>, ModelError>> + Send + 'a;
}
