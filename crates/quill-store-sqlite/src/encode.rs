//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields
//! (RouteOrigin, GapAnalysis) are stored as compact JSON. Enum discriminants
//! are stored as their snake_case names. UUIDs are stored as hyphenated
//! lowercase strings. A fact's `Lifetime` splits into the `good_until` /
//! `is_perpetual` column pair.

use chrono::{DateTime, Utc};
use quill_core::{
  answer::{Answer, AnswerSource},
  automation::AutomationRule,
  document::{
    ExtractedFactCandidate, ExtractionStatus, KnowledgeDocument,
    ParsingStatus, ValidationStatus,
  },
  question::{GapAnalysis, Priority, Question, QuestionStatus, RouteOrigin},
  routing::{ReassignmentRequest, ReassignmentStatus, SubDomain},
  wisdom::{FactTier, Lifetime, WisdomFact},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_dt_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── QuestionStatus ──────────────────────────────────────────────────────────

pub fn encode_question_status(s: QuestionStatus) -> String { s.to_string() }

pub fn decode_question_status(s: &str) -> Result<QuestionStatus> {
  use QuestionStatus::*;
  Ok(match s {
    "submitted" => Submitted,
    "processing" => Processing,
    "auto_answered" => AutoAnswered,
    "turbo_answered" => TurboAnswered,
    "human_requested" => HumanRequested,
    "expert_queue" => ExpertQueue,
    "in_progress" => InProgress,
    "needs_clarification" => NeedsClarification,
    "answered" => Answered,
    "resolved" => Resolved,
    "closed" => Closed,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "status",
        value: other.to_owned(),
      });
    }
  })
}

// ─── Priority ────────────────────────────────────────────────────────────────

pub fn encode_priority(p: Priority) -> &'static str {
  match p {
    Priority::Low => "low",
    Priority::Normal => "normal",
    Priority::High => "high",
    Priority::Urgent => "urgent",
  }
}

pub fn decode_priority(s: &str) -> Result<Priority> {
  Ok(match s {
    "low" => Priority::Low,
    "normal" => Priority::Normal,
    "high" => Priority::High,
    "urgent" => Priority::Urgent,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "priority",
        value: other.to_owned(),
      });
    }
  })
}

// ─── AnswerSource ────────────────────────────────────────────────────────────

pub fn encode_answer_source(s: AnswerSource) -> &'static str {
  match s {
    AnswerSource::Expert => "expert",
    AnswerSource::AiApproved => "ai_approved",
    AnswerSource::AiEdited => "ai_edited",
    AnswerSource::Automation => "automation",
  }
}

pub fn decode_answer_source(s: &str) -> Result<AnswerSource> {
  Ok(match s {
    "expert" => AnswerSource::Expert,
    "ai_approved" => AnswerSource::AiApproved,
    "ai_edited" => AnswerSource::AiEdited,
    "automation" => AnswerSource::Automation,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "source",
        value: other.to_owned(),
      });
    }
  })
}

// ─── FactTier ────────────────────────────────────────────────────────────────

pub fn encode_tier(t: FactTier) -> String { t.to_string() }

pub fn decode_tier(s: &str) -> Result<FactTier> {
  Ok(match s {
    "tier_0a" => FactTier::Tier0a,
    "tier_0b" => FactTier::Tier0b,
    "tier_0c" => FactTier::Tier0c,
    "pending" => FactTier::Pending,
    "archived" => FactTier::Archived,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "tier",
        value: other.to_owned(),
      });
    }
  })
}

// ─── Lifetime ────────────────────────────────────────────────────────────────

/// `(good_until, is_perpetual)` column pair.
pub fn encode_lifetime(lt: Lifetime) -> (Option<String>, bool) {
  match lt {
    Lifetime::Perpetual => (None, true),
    Lifetime::Until(d) => (Some(encode_dt(d)), false),
  }
}

pub fn decode_lifetime(
  good_until: Option<&str>,
  is_perpetual: bool,
) -> Result<Lifetime> {
  match (good_until, is_perpetual) {
    (None, true) => Ok(Lifetime::Perpetual),
    (Some(s), false) => Ok(Lifetime::Until(decode_dt(s)?)),
    _ => Err(Error::UnknownDiscriminant {
      field: "lifetime",
      value: format!("good_until={good_until:?} is_perpetual={is_perpetual}"),
    }),
  }
}

// ─── Document statuses ───────────────────────────────────────────────────────

pub fn encode_parsing_status(s: ParsingStatus) -> &'static str {
  match s {
    ParsingStatus::Pending => "pending",
    ParsingStatus::Processing => "processing",
    ParsingStatus::Completed => "completed",
    ParsingStatus::Failed => "failed",
  }
}

pub fn decode_parsing_status(s: &str) -> Result<ParsingStatus> {
  Ok(match s {
    "pending" => ParsingStatus::Pending,
    "processing" => ParsingStatus::Processing,
    "completed" => ParsingStatus::Completed,
    "failed" => ParsingStatus::Failed,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "parsing_status",
        value: other.to_owned(),
      });
    }
  })
}

pub fn encode_extraction_status(s: ExtractionStatus) -> &'static str {
  match s {
    ExtractionStatus::Pending => "pending",
    ExtractionStatus::Extracting => "extracting",
    ExtractionStatus::Completed => "completed",
    ExtractionStatus::Failed => "failed",
    ExtractionStatus::Partial => "partial",
  }
}

pub fn decode_extraction_status(s: &str) -> Result<ExtractionStatus> {
  Ok(match s {
    "pending" => ExtractionStatus::Pending,
    "extracting" => ExtractionStatus::Extracting,
    "completed" => ExtractionStatus::Completed,
    "failed" => ExtractionStatus::Failed,
    "partial" => ExtractionStatus::Partial,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "extraction_status",
        value: other.to_owned(),
      });
    }
  })
}

pub fn encode_validation_status(s: ValidationStatus) -> &'static str {
  match s {
    ValidationStatus::Pending => "pending",
    ValidationStatus::Approved => "approved",
    ValidationStatus::Rejected => "rejected",
    ValidationStatus::NeedsReview => "needs_review",
  }
}

pub fn decode_validation_status(s: &str) -> Result<ValidationStatus> {
  Ok(match s {
    "pending" => ValidationStatus::Pending,
    "approved" => ValidationStatus::Approved,
    "rejected" => ValidationStatus::Rejected,
    "needs_review" => ValidationStatus::NeedsReview,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "validation_status",
        value: other.to_owned(),
      });
    }
  })
}

// ─── ReassignmentStatus ──────────────────────────────────────────────────────

pub fn encode_reassignment_status(s: ReassignmentStatus) -> &'static str {
  match s {
    ReassignmentStatus::Pending => "pending",
    ReassignmentStatus::Approved => "approved",
    ReassignmentStatus::Rejected => "rejected",
  }
}

pub fn decode_reassignment_status(s: &str) -> Result<ReassignmentStatus> {
  Ok(match s {
    "pending" => ReassignmentStatus::Pending,
    "approved" => ReassignmentStatus::Approved,
    "rejected" => ReassignmentStatus::Rejected,
    other => {
      return Err(Error::UnknownDiscriminant {
        field: "reassignment_status",
        value: other.to_owned(),
      });
    }
  })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_route_origin(o: &RouteOrigin) -> Result<String> {
  Ok(serde_json::to_string(o)?)
}

pub fn decode_route_origin(s: &str) -> Result<RouteOrigin> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_gap_analysis(g: &GapAnalysis) -> Result<String> {
  Ok(serde_json::to_string(g)?)
}

pub fn decode_gap_analysis(s: &str) -> Result<GapAnalysis> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `questions` row.
pub struct RawQuestion {
  pub question_id:         String,
  pub original_text:       String,
  pub status:              String,
  pub priority:            String,
  pub category:            Option<String>,
  pub subdomain_id:        Option<String>,
  pub routing_origin:      String,
  pub asked_by:            String,
  pub assigned_to:         Option<String>,
  pub created_at:          String,
  pub routed_at:           String,
  pub first_response_at:   Option<String>,
  pub resolved_at:         Option<String>,
  pub satisfaction_rating: Option<i64>,
  pub gap_analysis:        String,
  pub version:             i64,
}

/// Column list matching [`RawQuestion`] field order.
pub const QUESTION_COLS: &str = "question_id, original_text, status, \
  priority, category, subdomain_id, routing_origin, asked_by, assigned_to, \
  created_at, routed_at, first_response_at, resolved_at, \
  satisfaction_rating, gap_analysis, version";

impl RawQuestion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:         row.get(0)?,
      original_text:       row.get(1)?,
      status:              row.get(2)?,
      priority:            row.get(3)?,
      category:            row.get(4)?,
      subdomain_id:        row.get(5)?,
      routing_origin:      row.get(6)?,
      asked_by:            row.get(7)?,
      assigned_to:         row.get(8)?,
      created_at:          row.get(9)?,
      routed_at:           row.get(10)?,
      first_response_at:   row.get(11)?,
      resolved_at:         row.get(12)?,
      satisfaction_rating: row.get(13)?,
      gap_analysis:        row.get(14)?,
      version:             row.get(15)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id:         decode_uuid(&self.question_id)?,
      original_text:       self.original_text,
      status:              decode_question_status(&self.status)?,
      priority:            decode_priority(&self.priority)?,
      category:            self.category,
      subdomain_id:        decode_uuid_opt(self.subdomain_id.as_deref())?,
      routing_origin:      decode_route_origin(&self.routing_origin)?,
      asked_by:            decode_uuid(&self.asked_by)?,
      assigned_to:         decode_uuid_opt(self.assigned_to.as_deref())?,
      created_at:          decode_dt(&self.created_at)?,
      routed_at:           decode_dt(&self.routed_at)?,
      first_response_at:   decode_dt_opt(self.first_response_at.as_deref())?,
      resolved_at:         decode_dt_opt(self.resolved_at.as_deref())?,
      satisfaction_rating: self.satisfaction_rating.map(|r| r as u8),
      gap_analysis:        decode_gap_analysis(&self.gap_analysis)?,
      version:             self.version,
    })
  }
}

/// Raw strings read directly from an `answers` row.
pub struct RawAnswer {
  pub answer_id:    String,
  pub question_id:  String,
  pub content:      String,
  pub source:       String,
  pub created_by:   String,
  pub delivered_at: String,
}

pub const ANSWER_COLS: &str =
  "answer_id, question_id, content, source, created_by, delivered_at";

impl RawAnswer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      answer_id:    row.get(0)?,
      question_id:  row.get(1)?,
      content:      row.get(2)?,
      source:       row.get(3)?,
      created_by:   row.get(4)?,
      delivered_at: row.get(5)?,
    })
  }

  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      answer_id:    decode_uuid(&self.answer_id)?,
      question_id:  decode_uuid(&self.question_id)?,
      content:      self.content,
      source:       decode_answer_source(&self.source)?,
      created_by:   decode_uuid(&self.created_by)?,
      delivered_at: decode_dt(&self.delivered_at)?,
    })
  }
}

/// Raw strings read directly from a `wisdom_facts` row.
pub struct RawFact {
  pub fact_id:            String,
  pub content:            String,
  pub tier:               String,
  pub confidence_score:   f64,
  pub importance:         i64,
  pub good_until:         Option<String>,
  pub is_perpetual:       bool,
  pub usage_count:        i64,
  pub last_used_at:       Option<String>,
  pub source_answer_id:   Option<String>,
  pub source_document_id: Option<String>,
  pub created_at:         String,
}

pub const FACT_COLS: &str = "fact_id, content, tier, confidence_score, \
  importance, good_until, is_perpetual, usage_count, last_used_at, \
  source_answer_id, source_document_id, created_at";

impl RawFact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fact_id:            row.get(0)?,
      content:            row.get(1)?,
      tier:               row.get(2)?,
      confidence_score:   row.get(3)?,
      importance:         row.get(4)?,
      good_until:         row.get(5)?,
      is_perpetual:       row.get(6)?,
      usage_count:        row.get(7)?,
      last_used_at:       row.get(8)?,
      source_answer_id:   row.get(9)?,
      source_document_id: row.get(10)?,
      created_at:         row.get(11)?,
    })
  }

  pub fn into_fact(self) -> Result<WisdomFact> {
    Ok(WisdomFact {
      fact_id:            decode_uuid(&self.fact_id)?,
      content:            self.content,
      tier:               decode_tier(&self.tier)?,
      confidence_score:   self.confidence_score,
      importance:         self.importance as u8,
      lifetime:           decode_lifetime(
        self.good_until.as_deref(),
        self.is_perpetual,
      )?,
      usage_count:        self.usage_count,
      last_used_at:       decode_dt_opt(self.last_used_at.as_deref())?,
      source_answer_id:   decode_uuid_opt(self.source_answer_id.as_deref())?,
      source_document_id: decode_uuid_opt(
        self.source_document_id.as_deref(),
      )?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub document_id:           String,
  pub title:                 String,
  pub content:               String,
  pub parsed_text:           Option<String>,
  pub parsing_status:        String,
  pub extraction_status:     String,
  pub extracted_facts_count: i64,
  pub validated_facts_count: i64,
  pub good_until:            Option<String>,
  pub is_perpetual:          bool,
  pub auto_delete_on_expiry: bool,
  pub uploaded_by:           String,
  pub created_at:            String,
}

pub const DOCUMENT_COLS: &str = "document_id, title, content, parsed_text, \
  parsing_status, extraction_status, extracted_facts_count, \
  validated_facts_count, good_until, is_perpetual, auto_delete_on_expiry, \
  uploaded_by, created_at";

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:           row.get(0)?,
      title:                 row.get(1)?,
      content:               row.get(2)?,
      parsed_text:           row.get(3)?,
      parsing_status:        row.get(4)?,
      extraction_status:     row.get(5)?,
      extracted_facts_count: row.get(6)?,
      validated_facts_count: row.get(7)?,
      good_until:            row.get(8)?,
      is_perpetual:          row.get(9)?,
      auto_delete_on_expiry: row.get(10)?,
      uploaded_by:           row.get(11)?,
      created_at:            row.get(12)?,
    })
  }

  pub fn into_document(self) -> Result<KnowledgeDocument> {
    Ok(KnowledgeDocument {
      document_id:           decode_uuid(&self.document_id)?,
      title:                 self.title,
      content:               self.content,
      parsed_text:           self.parsed_text,
      parsing_status:        decode_parsing_status(&self.parsing_status)?,
      extraction_status:     decode_extraction_status(
        &self.extraction_status,
      )?,
      extracted_facts_count: self.extracted_facts_count,
      validated_facts_count: self.validated_facts_count,
      lifetime:              decode_lifetime(
        self.good_until.as_deref(),
        self.is_perpetual,
      )?,
      auto_delete_on_expiry: self.auto_delete_on_expiry,
      uploaded_by:           decode_uuid(&self.uploaded_by)?,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `candidates` row.
pub struct RawCandidate {
  pub candidate_id:          String,
  pub document_id:           String,
  pub fact_text:             String,
  pub extraction_confidence: f64,
  pub validation_status:     String,
  pub rejection_reason:      Option<String>,
  pub created_at:            String,
}

pub const CANDIDATE_COLS: &str = "candidate_id, document_id, fact_text, \
  extraction_confidence, validation_status, rejection_reason, created_at";

impl RawCandidate {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      candidate_id:          row.get(0)?,
      document_id:           row.get(1)?,
      fact_text:             row.get(2)?,
      extraction_confidence: row.get(3)?,
      validation_status:     row.get(4)?,
      rejection_reason:      row.get(5)?,
      created_at:            row.get(6)?,
    })
  }

  pub fn into_candidate(self) -> Result<ExtractedFactCandidate> {
    Ok(ExtractedFactCandidate {
      candidate_id:          decode_uuid(&self.candidate_id)?,
      document_id:           decode_uuid(&self.document_id)?,
      fact_text:             self.fact_text,
      extraction_confidence: self.extraction_confidence,
      validation_status:     decode_validation_status(
        &self.validation_status,
      )?,
      rejection_reason:      self.rejection_reason,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `subdomains` row.
pub struct RawSubdomain {
  pub subdomain_id: String,
  pub name:         String,
  pub sla_hours:    i64,
  pub is_active:    bool,
  pub created_at:   String,
}

pub const SUBDOMAIN_COLS: &str =
  "subdomain_id, name, sla_hours, is_active, created_at";

impl RawSubdomain {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subdomain_id: row.get(0)?,
      name:         row.get(1)?,
      sla_hours:    row.get(2)?,
      is_active:    row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_subdomain(self) -> Result<SubDomain> {
    Ok(SubDomain {
      subdomain_id: decode_uuid(&self.subdomain_id)?,
      name:         self.name,
      sla_hours:    self.sla_hours,
      is_active:    self.is_active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `automation_rules` row.
pub struct RawRule {
  pub rule_id:         String,
  pub trigger_text:    String,
  pub answer_text:     String,
  pub enabled:         bool,
  pub times_triggered: i64,
  pub times_accepted:  i64,
  pub times_rejected:  i64,
  pub created_at:      String,
}

pub const RULE_COLS: &str = "rule_id, trigger_text, answer_text, enabled, \
  times_triggered, times_accepted, times_rejected, created_at";

impl RawRule {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rule_id:         row.get(0)?,
      trigger_text:    row.get(1)?,
      answer_text:     row.get(2)?,
      enabled:         row.get(3)?,
      times_triggered: row.get(4)?,
      times_accepted:  row.get(5)?,
      times_rejected:  row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_rule(self) -> Result<AutomationRule> {
    Ok(AutomationRule {
      rule_id:         decode_uuid(&self.rule_id)?,
      trigger_text:    self.trigger_text,
      answer_text:     self.answer_text,
      enabled:         self.enabled,
      times_triggered: self.times_triggered,
      times_accepted:  self.times_accepted,
      times_rejected:  self.times_rejected,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `reassignment_requests` row.
pub struct RawReassignment {
  pub request_id:             String,
  pub question_id:            String,
  pub requested_by:           String,
  pub current_subdomain_id:   Option<String>,
  pub suggested_subdomain_id: String,
  pub reason:                 String,
  pub status:                 String,
  pub reviewed_by:            Option<String>,
  pub admin_notes:            Option<String>,
  pub created_at:             String,
  pub reviewed_at:            Option<String>,
}

pub const REASSIGNMENT_COLS: &str = "request_id, question_id, requested_by, \
  current_subdomain_id, suggested_subdomain_id, reason, status, reviewed_by, \
  admin_notes, created_at, reviewed_at";

impl RawReassignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:             row.get(0)?,
      question_id:            row.get(1)?,
      requested_by:           row.get(2)?,
      current_subdomain_id:   row.get(3)?,
      suggested_subdomain_id: row.get(4)?,
      reason:                 row.get(5)?,
      status:                 row.get(6)?,
      reviewed_by:            row.get(7)?,
      admin_notes:            row.get(8)?,
      created_at:             row.get(9)?,
      reviewed_at:            row.get(10)?,
    })
  }

  pub fn into_request(self) -> Result<ReassignmentRequest> {
    Ok(ReassignmentRequest {
      request_id:             decode_uuid(&self.request_id)?,
      question_id:            decode_uuid(&self.question_id)?,
      requested_by:           decode_uuid(&self.requested_by)?,
      current_subdomain_id:   decode_uuid_opt(
        self.current_subdomain_id.as_deref(),
      )?,
      suggested_subdomain_id: decode_uuid(&self.suggested_subdomain_id)?,
      reason:                 self.reason,
      status:                 decode_reassignment_status(&self.status)?,
      reviewed_by:            decode_uuid_opt(self.reviewed_by.as_deref())?,
      admin_notes:            self.admin_notes,
      created_at:             decode_dt(&self.created_at)?,
      reviewed_at:            decode_dt_opt(self.reviewed_at.as_deref())?,
    })
  }
}
