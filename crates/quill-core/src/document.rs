//! Knowledge documents and their extraction candidates.
//!
//! A document moves through two independent state machines: parsing and
//! extraction. Extraction is gated on parsing completion but otherwise the
//! two statuses evolve separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wisdom::Lifetime;

// ─── Statuses ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

/// `Completed` means every candidate the extractor yielded was persisted;
/// `Partial` marks runs where some candidate rows failed while others
/// succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
  Pending,
  Extracting,
  Completed,
  Failed,
  Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
  Pending,
  Approved,
  Rejected,
  NeedsReview,
}

impl ValidationStatus {
  /// Approval and rejection are irreversible.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Approved | Self::Rejected)
  }
}

// ─── KnowledgeDocument ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
  pub document_id:           Uuid,
  pub title:                 String,
  /// Raw uploaded content.
  pub content:               String,
  /// Populated when parsing completes.
  pub parsed_text:           Option<String>,
  pub parsing_status:        ParsingStatus,
  pub extraction_status:     ExtractionStatus,
  pub extracted_facts_count: i64,
  pub validated_facts_count: i64,
  pub lifetime:              Lifetime,
  /// Document-level opt-in: the expiry sweep may delete this document (and
  /// its unvalidated candidates) once expired. Never touches facts already
  /// approved out of it.
  pub auto_delete_on_expiry: bool,
  pub uploaded_by:           Uuid,
  pub created_at:            DateTime<Utc>,
}

/// Input to document upload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
  pub title:                 String,
  pub content:               String,
  pub lifetime:              Lifetime,
  #[serde(default)]
  pub auto_delete_on_expiry: bool,
}

// ─── ExtractedFactCandidate ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFactCandidate {
  pub candidate_id:          Uuid,
  pub document_id:           Uuid,
  pub fact_text:             String,
  /// 0–1, assigned by the extractor.
  pub extraction_confidence: f64,
  pub validation_status:     ValidationStatus,
  pub rejection_reason:      Option<String>,
  pub created_at:            DateTime<Utc>,
}

/// Expert overrides applied when approving a candidate into the store.
/// Unset fields fall back to the candidate's own values and the defaults
/// described in the approval operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalOverrides {
  pub content:          Option<String>,
  pub tier:             Option<crate::wisdom::FactTier>,
  pub confidence_score: Option<f64>,
  pub importance:       Option<u8>,
  pub lifetime:         Option<Lifetime>,
}

/// Outcome of a bulk approval pass. Each candidate's approval is independent;
/// failures are reported per candidate and never abort the rest.
#[derive(Debug, Clone, Serialize)]
pub struct BulkApprovalReport {
  pub approved: u64,
  pub errors:   Vec<BulkApprovalError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkApprovalError {
  pub candidate_id: Uuid,
  pub error:        String,
}
