//! [`SqliteStore`] — the SQLite implementation of [`TriageStore`].
//!
//! Multi-entity operations (submission, answer recording, candidate
//! approval, reassignment review) run inside one SQLite transaction on the
//! dedicated connection thread, so they are atomic with respect to every
//! other caller. Question writes carry the optimistic version check.

use std::path::Path;

use quill_core::{
  Error as CoreError,
  answer::Answer,
  automation::AutomationRule,
  document::{
    ExtractedFactCandidate, ExtractionStatus, KnowledgeDocument,
    ParsingStatus, ValidationStatus,
  },
  page::{Page, PageRequest},
  question::Question,
  routing::{ReassignmentRequest, ReassignmentStatus, SubDomain, SubDomainPatch},
  store::{QuestionFilter, SlaEntry, TriageStore},
  wisdom::{FactTier, WisdomFact},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    ANSWER_COLS, CANDIDATE_COLS, DOCUMENT_COLS, FACT_COLS, QUESTION_COLS,
    RULE_COLS, RawAnswer, RawCandidate, RawDocument, RawFact, RawQuestion,
    RawReassignment, RawRule, RawSubdomain, REASSIGNMENT_COLS,
    SUBDOMAIN_COLS, encode_answer_source, encode_dt,
    encode_extraction_status, encode_gap_analysis, encode_lifetime,
    encode_parsing_status, encode_priority, encode_question_status,
    encode_reassignment_status, encode_route_origin, encode_tier,
    encode_uuid, encode_validation_status,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quill triage store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self, CoreError> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<(), CoreError> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }
}

// ─── Encoded rows ────────────────────────────────────────────────────────────

/// A question encoded to its column representation, owned so it can move
/// into the connection-thread closure.
struct QuestionRow {
  question_id:         String,
  original_text:       String,
  status:              String,
  priority:            String,
  category:            Option<String>,
  subdomain_id:        Option<String>,
  routing_origin:      String,
  asked_by:            String,
  assigned_to:         Option<String>,
  created_at:          String,
  routed_at:           String,
  first_response_at:   Option<String>,
  resolved_at:         Option<String>,
  satisfaction_rating: Option<i64>,
  gap_analysis:        String,
  version:             i64,
}

impl QuestionRow {
  fn encode(q: &Question) -> Result<Self, CoreError> {
    Ok(Self {
      question_id:         encode_uuid(q.question_id),
      original_text:       q.original_text.clone(),
      status:              encode_question_status(q.status),
      priority:            encode_priority(q.priority).to_owned(),
      category:            q.category.clone(),
      subdomain_id:        q.subdomain_id.map(encode_uuid),
      routing_origin:      encode_route_origin(&q.routing_origin)
        .map_err(CoreError::from)?,
      asked_by:            encode_uuid(q.asked_by),
      assigned_to:         q.assigned_to.map(encode_uuid),
      created_at:          encode_dt(q.created_at),
      routed_at:           encode_dt(q.routed_at),
      first_response_at:   q.first_response_at.map(encode_dt),
      resolved_at:         q.resolved_at.map(encode_dt),
      satisfaction_rating: q.satisfaction_rating.map(i64::from),
      gap_analysis:        encode_gap_analysis(&q.gap_analysis)
        .map_err(CoreError::from)?,
      version:             q.version,
    })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO questions (
         question_id, original_text, status, priority, category,
         subdomain_id, routing_origin, asked_by, assigned_to, created_at,
         routed_at, first_response_at, resolved_at, satisfaction_rating,
         gap_analysis, version
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                 ?14, ?15, ?16)",
      rusqlite::params![
        self.question_id,
        self.original_text,
        self.status,
        self.priority,
        self.category,
        self.subdomain_id,
        self.routing_origin,
        self.asked_by,
        self.assigned_to,
        self.created_at,
        self.routed_at,
        self.first_response_at,
        self.resolved_at,
        self.satisfaction_rating,
        self.gap_analysis,
        self.version,
      ],
    )?;
    Ok(())
  }

  /// Conditional write-back: succeeds only while the stored row still holds
  /// `self.version`; the stored version advances by one. Returns the number
  /// of rows hit (0 = stale or missing).
  fn update_checked(
    &self,
    conn: &rusqlite::Connection,
  ) -> rusqlite::Result<usize> {
    conn.execute(
      "UPDATE questions SET
         status = ?2, priority = ?3, category = ?4, subdomain_id = ?5,
         routing_origin = ?6, assigned_to = ?7, routed_at = ?8,
         first_response_at = ?9, resolved_at = ?10,
         satisfaction_rating = ?11, gap_analysis = ?12, version = ?13 + 1
       WHERE question_id = ?1 AND version = ?13",
      rusqlite::params![
        self.question_id,
        self.status,
        self.priority,
        self.category,
        self.subdomain_id,
        self.routing_origin,
        self.assigned_to,
        self.routed_at,
        self.first_response_at,
        self.resolved_at,
        self.satisfaction_rating,
        self.gap_analysis,
        self.version,
      ],
    )
  }
}

fn insert_answer_row(
  conn: &rusqlite::Connection,
  a: &Answer,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO answers (answer_id, question_id, content, source,
       created_by, delivered_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(a.answer_id),
      encode_uuid(a.question_id),
      a.content,
      encode_answer_source(a.source),
      encode_uuid(a.created_by),
      encode_dt(a.delivered_at),
    ],
  )?;
  Ok(())
}

fn insert_fact_row(
  conn: &rusqlite::Connection,
  f: &WisdomFact,
) -> rusqlite::Result<()> {
  let (good_until, is_perpetual) = encode_lifetime(f.lifetime);
  conn.execute(
    "INSERT INTO wisdom_facts (fact_id, content, tier, confidence_score,
       importance, good_until, is_perpetual, usage_count, last_used_at,
       source_answer_id, source_document_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    rusqlite::params![
      encode_uuid(f.fact_id),
      f.content,
      encode_tier(f.tier),
      f.confidence_score,
      i64::from(f.importance),
      good_until,
      is_perpetual,
      f.usage_count,
      f.last_used_at.map(encode_dt),
      f.source_answer_id.map(encode_uuid),
      f.source_document_id.map(encode_uuid),
      encode_dt(f.created_at),
    ],
  )?;
  Ok(())
}

fn select_question_row(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Option<RawQuestion>> {
  conn
    .query_row(
      &format!("SELECT {QUESTION_COLS} FROM questions WHERE question_id = ?1"),
      rusqlite::params![id],
      RawQuestion::from_row,
    )
    .optional()
}

/// Outcome of a guarded question write, resolved on the connection thread.
enum WriteOutcome {
  Missing,
  Stale,
  Updated(RawQuestion),
}

// ─── TriageStore impl ────────────────────────────────────────────────────────

impl TriageStore for SqliteStore {
  // ── Questions ─────────────────────────────────────────────────────────────

  async fn persist_submission(
    &self,
    question: &Question,
    answer: Option<&Answer>,
    triggered_rule: Option<Uuid>,
    used_facts: &[Uuid],
  ) -> Result<(), CoreError> {
    let row = QuestionRow::encode(question)?;
    let answer = answer.cloned();
    let rule_id = triggered_rule.map(encode_uuid);
    let fact_ids: Vec<String> =
      used_facts.iter().copied().map(encode_uuid).collect();
    let used_at = encode_dt(question.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        row.insert(&tx)?;
        if let Some(a) = &answer {
          insert_answer_row(&tx, a)?;
        }
        if let Some(rid) = &rule_id {
          tx.execute(
            "UPDATE automation_rules
               SET times_triggered = times_triggered + 1
             WHERE rule_id = ?1",
            rusqlite::params![rid],
          )?;
        }
        for fid in &fact_ids {
          tx.execute(
            "UPDATE wisdom_facts
               SET usage_count = usage_count + 1, last_used_at = ?2
             WHERE fact_id = ?1",
            rusqlite::params![fid, used_at],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_question(&self, id: Uuid) -> Result<Option<Question>, CoreError> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| select_question_row(conn, &id_str).map_err(Into::into))
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_question().map_err(CoreError::from))
      .transpose()
  }

  async fn list_questions(
    &self,
    filter: &QuestionFilter,
    page: &PageRequest,
  ) -> Result<Page<Question>, CoreError> {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(status) = filter.status {
      params.push(encode_question_status(status));
      conds.push(format!("status = ?{}", params.len()));
    }
    if let Some(category) = &filter.category {
      params.push(category.clone());
      conds.push(format!("category = ?{}", params.len()));
    }
    if let Some(priority) = filter.priority {
      params.push(encode_priority(priority).to_owned());
      conds.push(format!("priority = ?{}", params.len()));
    }
    if let Some(sd) = filter.subdomain_id {
      params.push(encode_uuid(sd));
      conds.push(format!("subdomain_id = ?{}", params.len()));
    }
    if let Some(expert) = filter.assigned_to {
      params.push(encode_uuid(expert));
      conds.push(format!("assigned_to = ?{}", params.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawQuestion>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM questions {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?;

        let sql = format!(
          "SELECT {QUESTION_COLS} FROM questions {where_clause}
           ORDER BY created_at DESC
           LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter()),
            RawQuestion::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_question().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(items, total, &page_req))
  }

  async fn update_question(
    &self,
    question: &Question,
  ) -> Result<Question, CoreError> {
    let row = QuestionRow::encode(question)?;
    let id = question.question_id;

    let outcome = self
      .conn
      .call(move |conn| {
        let hit = row.update_checked(conn)?;
        if hit == 0 {
          return match select_question_row(conn, &row.question_id)? {
            Some(_) => Ok(WriteOutcome::Stale),
            None => Ok(WriteOutcome::Missing),
          };
        }
        match select_question_row(conn, &row.question_id)? {
          Some(updated) => Ok(WriteOutcome::Updated(updated)),
          None => Ok(WriteOutcome::Missing),
        }
      })
      .await
      .map_err(db_err)?;

    match outcome {
      WriteOutcome::Missing => Err(CoreError::QuestionNotFound(id)),
      WriteOutcome::Stale => Err(CoreError::VersionConflict(id)),
      WriteOutcome::Updated(raw) => Ok(raw.into_question()?),
    }
  }

  async fn record_answer(
    &self,
    answer: &Answer,
    question: &Question,
  ) -> Result<Question, CoreError> {
    let row = QuestionRow::encode(question)?;
    let answer = answer.clone();
    let id = question.question_id;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let hit = row.update_checked(&tx)?;
        if hit == 0 {
          let out = match select_question_row(&tx, &row.question_id)? {
            Some(_) => WriteOutcome::Stale,
            None => WriteOutcome::Missing,
          };
          return Ok(out);
        }
        insert_answer_row(&tx, &answer)?;
        let updated = match select_question_row(&tx, &row.question_id)? {
          Some(q) => q,
          None => return Ok(WriteOutcome::Missing),
        };
        tx.commit()?;
        Ok(WriteOutcome::Updated(updated))
      })
      .await
      .map_err(db_err)?;

    match outcome {
      WriteOutcome::Missing => Err(CoreError::QuestionNotFound(id)),
      WriteOutcome::Stale => Err(CoreError::VersionConflict(id)),
      WriteOutcome::Updated(raw) => Ok(raw.into_question()?),
    }
  }

  async fn list_answers(
    &self,
    question_id: Uuid,
  ) -> Result<Vec<Answer>, CoreError> {
    let id_str = encode_uuid(question_id);
    let raws: Vec<RawAnswer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ANSWER_COLS} FROM answers
           WHERE question_id = ?1 ORDER BY delivered_at ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAnswer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_answer().map_err(CoreError::from))
      .collect()
  }

  // ── Wisdom facts ──────────────────────────────────────────────────────────

  async fn insert_fact(&self, fact: &WisdomFact) -> Result<(), CoreError> {
    let fact = fact.clone();
    self
      .conn
      .call(move |conn| {
        insert_fact_row(conn, &fact)?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_fact(&self, id: Uuid) -> Result<Option<WisdomFact>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawFact> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!("SELECT {FACT_COLS} FROM wisdom_facts WHERE fact_id = ?1"),
            rusqlite::params![id_str],
            RawFact::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw.map(|r| r.into_fact().map_err(CoreError::from)).transpose()
  }

  async fn list_facts(
    &self,
    tier: Option<FactTier>,
    page: &PageRequest,
  ) -> Result<Page<WisdomFact>, CoreError> {
    let tier_str = tier.map(encode_tier);
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawFact>) = self
      .conn
      .call(move |conn| {
        let (where_clause, params) = match &tier_str {
          Some(t) => ("WHERE tier = ?1", vec![t.clone()]),
          None => ("", vec![]),
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM wisdom_facts {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLS} FROM wisdom_facts {where_clause}
           ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_fact().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn set_fact_tier(
    &self,
    id: Uuid,
    tier: FactTier,
  ) -> Result<WisdomFact, CoreError> {
    let id_str = encode_uuid(id);
    let tier_str = encode_tier(tier);

    let raw: Option<RawFact> = self
      .conn
      .call(move |conn| {
        let hit = conn.execute(
          "UPDATE wisdom_facts SET tier = ?2 WHERE fact_id = ?1",
          rusqlite::params![id_str, tier_str],
        )?;
        if hit == 0 {
          return Ok(None);
        }
        conn
          .query_row(
            &format!("SELECT {FACT_COLS} FROM wisdom_facts WHERE fact_id = ?1"),
            rusqlite::params![id_str],
            RawFact::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;

    match raw {
      Some(r) => Ok(r.into_fact()?),
      None => Err(CoreError::FactNotFound(id)),
    }
  }

  async fn scorable_facts(
    &self,
    now: chrono::DateTime<chrono::Utc>,
  ) -> Result<Vec<WisdomFact>, CoreError> {
    let now_str = encode_dt(now);
    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLS} FROM wisdom_facts
           WHERE tier IN ('tier_0a', 'tier_0b', 'tier_0c')
             AND (is_perpetual = 1 OR good_until >= ?1)"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![now_str], RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_fact().map_err(CoreError::from))
      .collect()
  }

  async fn searchable_facts(&self) -> Result<Vec<WisdomFact>, CoreError> {
    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLS} FROM wisdom_facts WHERE tier != 'archived'"
        ))?;
        let rows = stmt
          .query_map([], RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_fact().map_err(CoreError::from))
      .collect()
  }

  async fn touch_fact_usage(
    &self,
    ids: &[Uuid],
    at: chrono::DateTime<chrono::Utc>,
  ) -> Result<(), CoreError> {
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
    let at_str = encode_dt(at);
    self
      .conn
      .call(move |conn| {
        for id in &id_strs {
          conn.execute(
            "UPDATE wisdom_facts
               SET usage_count = usage_count + 1, last_used_at = ?2
             WHERE fact_id = ?1",
            rusqlite::params![id, at_str],
          )?;
        }
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn archive_expired_facts(
    &self,
    now: chrono::DateTime<chrono::Utc>,
  ) -> Result<u64, CoreError> {
    let now_str = encode_dt(now);
    self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE wisdom_facts SET tier = 'archived'
           WHERE is_perpetual = 0 AND good_until < ?1 AND tier != 'archived'",
          rusqlite::params![now_str],
        )?;
        Ok(n as u64)
      })
      .await
      .map_err(db_err)
  }

  // ── Automation rules ──────────────────────────────────────────────────────

  async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), CoreError> {
    let r = rule.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO automation_rules (rule_id, trigger_text, answer_text,
             enabled, times_triggered, times_accepted, times_rejected,
             created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(r.rule_id),
            r.trigger_text,
            r.answer_text,
            r.enabled,
            r.times_triggered,
            r.times_accepted,
            r.times_rejected,
            encode_dt(r.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_rule(
    &self,
    id: Uuid,
  ) -> Result<Option<AutomationRule>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!("SELECT {RULE_COLS} FROM automation_rules WHERE rule_id = ?1"),
            rusqlite::params![id_str],
            RawRule::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw.map(|r| r.into_rule().map_err(CoreError::from)).transpose()
  }

  async fn list_rules(
    &self,
    page: &PageRequest,
  ) -> Result<Page<AutomationRule>, CoreError> {
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawRule>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM automation_rules",
          [],
          |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {RULE_COLS} FROM automation_rules
           ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map([], RawRule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_rule().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn set_rule_enabled(
    &self,
    id: Uuid,
    enabled: bool,
  ) -> Result<AutomationRule, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        let hit = conn.execute(
          "UPDATE automation_rules SET enabled = ?2 WHERE rule_id = ?1",
          rusqlite::params![id_str, enabled],
        )?;
        if hit == 0 {
          return Ok(None);
        }
        conn
          .query_row(
            &format!("SELECT {RULE_COLS} FROM automation_rules WHERE rule_id = ?1"),
            rusqlite::params![id_str],
            RawRule::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;

    match raw {
      Some(r) => Ok(r.into_rule()?),
      None => Err(CoreError::RuleNotFound(id)),
    }
  }

  async fn enabled_rules(&self) -> Result<Vec<AutomationRule>, CoreError> {
    let raws: Vec<RawRule> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RULE_COLS} FROM automation_rules WHERE enabled = 1"
        ))?;
        let rows = stmt
          .query_map([], RawRule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_rule().map_err(CoreError::from))
      .collect()
  }

  async fn record_rule_outcome(
    &self,
    id: Uuid,
    accepted: bool,
  ) -> Result<(), CoreError> {
    let id_str = encode_uuid(id);
    let column = if accepted { "times_accepted" } else { "times_rejected" };
    let sql = format!(
      "UPDATE automation_rules SET {column} = {column} + 1 WHERE rule_id = ?1"
    );
    let hit = self
      .conn
      .call(move |conn| {
        let hit = conn.execute(&sql, rusqlite::params![id_str])?;
        Ok(hit)
      })
      .await
      .map_err(db_err)?;

    if hit == 0 {
      return Err(CoreError::RuleNotFound(id));
    }
    Ok(())
  }

  // ── Documents & candidates ────────────────────────────────────────────────

  async fn insert_document(
    &self,
    document: &KnowledgeDocument,
  ) -> Result<(), CoreError> {
    let d = document.clone();
    self
      .conn
      .call(move |conn| {
        let (good_until, is_perpetual) = encode_lifetime(d.lifetime);
        conn.execute(
          "INSERT INTO documents (document_id, title, content, parsed_text,
             parsing_status, extraction_status, extracted_facts_count,
             validated_facts_count, good_until, is_perpetual,
             auto_delete_on_expiry, uploaded_by, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            encode_uuid(d.document_id),
            d.title,
            d.content,
            d.parsed_text,
            encode_parsing_status(d.parsing_status),
            encode_extraction_status(d.extraction_status),
            d.extracted_facts_count,
            d.validated_facts_count,
            good_until,
            is_perpetual,
            d.auto_delete_on_expiry,
            encode_uuid(d.uploaded_by),
            encode_dt(d.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_document(
    &self,
    id: Uuid,
  ) -> Result<Option<KnowledgeDocument>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!("SELECT {DOCUMENT_COLS} FROM documents WHERE document_id = ?1"),
            rusqlite::params![id_str],
            RawDocument::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_document().map_err(CoreError::from))
      .transpose()
  }

  async fn list_documents(
    &self,
    page: &PageRequest,
  ) -> Result<Page<KnowledgeDocument>, CoreError> {
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawDocument>) = self
      .conn
      .call(move |conn| {
        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLS} FROM documents
           ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map([], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_document().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn set_parsing_status(
    &self,
    id: Uuid,
    from: &[ParsingStatus],
    to: ParsingStatus,
    parsed_text: Option<&str>,
  ) -> Result<KnowledgeDocument, CoreError> {
    let id_str = encode_uuid(id);
    let from_strs: Vec<String> = from
      .iter()
      .map(|s| encode_parsing_status(*s).to_owned())
      .collect();
    let to_str = encode_parsing_status(to).to_owned();
    let text = parsed_text.map(str::to_owned);

    enum Outcome {
      Missing,
      Stale,
      Updated(RawDocument),
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let placeholders = from_strs
          .iter()
          .enumerate()
          .map(|(i, _)| format!("?{}", i + 3))
          .collect::<Vec<_>>()
          .join(", ");
        let sql = format!(
          "UPDATE documents
             SET parsing_status = ?2,
                 parsed_text = COALESCE(?{}, parsed_text)
           WHERE document_id = ?1 AND parsing_status IN ({placeholders})",
          from_strs.len() + 3
        );
        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&id_str, &to_str];
        for s in &from_strs {
          params.push(s);
        }
        params.push(&text);
        let hit = conn.execute(&sql, params.as_slice())?;

        if hit == 0 {
          let exists: bool = conn
            .query_row(
              "SELECT 1 FROM documents WHERE document_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          return Ok(if exists { Outcome::Stale } else { Outcome::Missing });
        }

        let updated = conn.query_row(
          &format!("SELECT {DOCUMENT_COLS} FROM documents WHERE document_id = ?1"),
          rusqlite::params![id_str],
          RawDocument::from_row,
        )?;
        Ok(Outcome::Updated(updated))
      })
      .await
      .map_err(db_err)?;

    match outcome {
      Outcome::Missing => Err(CoreError::DocumentNotFound(id)),
      Outcome::Stale => Err(CoreError::StaleDocumentState(id)),
      Outcome::Updated(raw) => Ok(raw.into_document()?),
    }
  }

  async fn begin_extraction(
    &self,
    id: Uuid,
  ) -> Result<KnowledgeDocument, CoreError> {
    let id_str = encode_uuid(id);

    enum Outcome {
      Missing,
      Busy,
      Updated(RawDocument),
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT extraction_status FROM documents WHERE document_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let out = match current.as_deref() {
          None => Outcome::Missing,
          Some("extracting") => Outcome::Busy,
          Some(_) => {
            tx.execute(
              "UPDATE documents SET extraction_status = 'extracting'
               WHERE document_id = ?1",
              rusqlite::params![id_str],
            )?;
            let updated = tx.query_row(
              &format!(
                "SELECT {DOCUMENT_COLS} FROM documents WHERE document_id = ?1"
              ),
              rusqlite::params![id_str],
              RawDocument::from_row,
            )?;
            Outcome::Updated(updated)
          }
        };
        tx.commit()?;
        Ok(out)
      })
      .await
      .map_err(db_err)?;

    match outcome {
      Outcome::Missing => Err(CoreError::DocumentNotFound(id)),
      Outcome::Busy => Err(CoreError::ExtractionInProgress(id)),
      Outcome::Updated(raw) => Ok(raw.into_document()?),
    }
  }

  async fn finish_extraction(
    &self,
    id: Uuid,
    status: ExtractionStatus,
    extracted_count: i64,
  ) -> Result<KnowledgeDocument, CoreError> {
    let id_str = encode_uuid(id);
    let status_str = encode_extraction_status(status).to_owned();

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        let hit = conn.execute(
          "UPDATE documents
             SET extraction_status = ?2, extracted_facts_count = ?3
           WHERE document_id = ?1",
          rusqlite::params![id_str, status_str, extracted_count],
        )?;
        if hit == 0 {
          return Ok(None);
        }
        conn
          .query_row(
            &format!("SELECT {DOCUMENT_COLS} FROM documents WHERE document_id = ?1"),
            rusqlite::params![id_str],
            RawDocument::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;

    match raw {
      Some(r) => Ok(r.into_document()?),
      None => Err(CoreError::DocumentNotFound(id)),
    }
  }

  async fn insert_candidate(
    &self,
    candidate: &ExtractedFactCandidate,
  ) -> Result<(), CoreError> {
    let c = candidate.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO candidates (candidate_id, document_id, fact_text,
             extraction_confidence, validation_status, rejection_reason,
             created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            encode_uuid(c.candidate_id),
            encode_uuid(c.document_id),
            c.fact_text,
            c.extraction_confidence,
            encode_validation_status(c.validation_status),
            c.rejection_reason,
            encode_dt(c.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_candidate(
    &self,
    id: Uuid,
  ) -> Result<Option<ExtractedFactCandidate>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCandidate> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!(
              "SELECT {CANDIDATE_COLS} FROM candidates WHERE candidate_id = ?1"
            ),
            rusqlite::params![id_str],
            RawCandidate::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_candidate().map_err(CoreError::from))
      .transpose()
  }

  async fn list_candidates(
    &self,
    document_id: Uuid,
    status: Option<ValidationStatus>,
    page: &PageRequest,
  ) -> Result<Page<ExtractedFactCandidate>, CoreError> {
    let doc_str = encode_uuid(document_id);
    let status_str = status.map(|s| encode_validation_status(s).to_owned());
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawCandidate>) = self
      .conn
      .call(move |conn| {
        let (where_clause, params): (&str, Vec<String>) = match &status_str {
          Some(s) => (
            "WHERE document_id = ?1 AND validation_status = ?2",
            vec![doc_str.clone(), s.clone()],
          ),
          None => ("WHERE document_id = ?1", vec![doc_str.clone()]),
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM candidates {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {CANDIDATE_COLS} FROM candidates {where_clause}
           ORDER BY created_at ASC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter()),
            RawCandidate::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_candidate().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn pending_candidates(
    &self,
    document_id: Uuid,
  ) -> Result<Vec<ExtractedFactCandidate>, CoreError> {
    let doc_str = encode_uuid(document_id);
    let raws: Vec<RawCandidate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CANDIDATE_COLS} FROM candidates
           WHERE document_id = ?1 AND validation_status = 'pending'
           ORDER BY created_at ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![doc_str], RawCandidate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_candidate().map_err(CoreError::from))
      .collect()
  }

  async fn approve_candidate(
    &self,
    candidate_id: Uuid,
    fact: &WisdomFact,
  ) -> Result<ExtractedFactCandidate, CoreError> {
    let id_str = encode_uuid(candidate_id);
    let fact = fact.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let out = match candidate_status(&tx, &id_str)? {
          None => CandidateOutcome::Missing,
          Some(s) if is_terminal_status(&s) => CandidateOutcome::Terminal,
          Some(_) => {
            tx.execute(
              "UPDATE candidates SET validation_status = 'approved'
               WHERE candidate_id = ?1",
              rusqlite::params![id_str],
            )?;
            insert_fact_row(&tx, &fact)?;
            tx.execute(
              "UPDATE documents
                 SET validated_facts_count = validated_facts_count + 1
               WHERE document_id =
                 (SELECT document_id FROM candidates WHERE candidate_id = ?1)",
              rusqlite::params![id_str],
            )?;
            let updated = tx.query_row(
              &format!(
                "SELECT {CANDIDATE_COLS} FROM candidates WHERE candidate_id = ?1"
              ),
              rusqlite::params![id_str],
              RawCandidate::from_row,
            )?;
            CandidateOutcome::Updated(updated)
          }
        };
        tx.commit()?;
        Ok(out)
      })
      .await
      .map_err(db_err)?;

    resolve_candidate_outcome(outcome, candidate_id)
  }

  async fn reject_candidate(
    &self,
    candidate_id: Uuid,
    reason: &str,
  ) -> Result<ExtractedFactCandidate, CoreError> {
    let id_str = encode_uuid(candidate_id);
    let reason = reason.to_owned();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let out = match candidate_status(&tx, &id_str)? {
          None => CandidateOutcome::Missing,
          Some(s) if is_terminal_status(&s) => CandidateOutcome::Terminal,
          Some(_) => {
            tx.execute(
              "UPDATE candidates
                 SET validation_status = 'rejected', rejection_reason = ?2
               WHERE candidate_id = ?1",
              rusqlite::params![id_str, reason],
            )?;
            let updated = tx.query_row(
              &format!(
                "SELECT {CANDIDATE_COLS} FROM candidates WHERE candidate_id = ?1"
              ),
              rusqlite::params![id_str],
              RawCandidate::from_row,
            )?;
            CandidateOutcome::Updated(updated)
          }
        };
        tx.commit()?;
        Ok(out)
      })
      .await
      .map_err(db_err)?;

    resolve_candidate_outcome(outcome, candidate_id)
  }

  async fn flag_candidate(
    &self,
    candidate_id: Uuid,
  ) -> Result<ExtractedFactCandidate, CoreError> {
    let id_str = encode_uuid(candidate_id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let out = match candidate_status(&tx, &id_str)? {
          None => CandidateOutcome::Missing,
          Some(s) if is_terminal_status(&s) => CandidateOutcome::Terminal,
          Some(_) => {
            tx.execute(
              "UPDATE candidates SET validation_status = 'needs_review'
               WHERE candidate_id = ?1",
              rusqlite::params![id_str],
            )?;
            let updated = tx.query_row(
              &format!(
                "SELECT {CANDIDATE_COLS} FROM candidates WHERE candidate_id = ?1"
              ),
              rusqlite::params![id_str],
              RawCandidate::from_row,
            )?;
            CandidateOutcome::Updated(updated)
          }
        };
        tx.commit()?;
        Ok(out)
      })
      .await
      .map_err(db_err)?;

    resolve_candidate_outcome(outcome, candidate_id)
  }

  async fn delete_expired_documents(
    &self,
    now: chrono::DateTime<chrono::Utc>,
  ) -> Result<u64, CoreError> {
    let now_str = encode_dt(now);
    self
      .conn
      .call(move |conn| {
        // Candidate rows go with the document via ON DELETE CASCADE;
        // approved facts keep their provenance id and survive.
        let n = conn.execute(
          "DELETE FROM documents
           WHERE is_perpetual = 0 AND good_until < ?1
             AND auto_delete_on_expiry = 1",
          rusqlite::params![now_str],
        )?;
        Ok(n as u64)
      })
      .await
      .map_err(db_err)
  }

  // ── Sub-domains ───────────────────────────────────────────────────────────

  async fn insert_subdomain(
    &self,
    subdomain: &SubDomain,
  ) -> Result<(), CoreError> {
    let s = subdomain.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subdomains (subdomain_id, name, sla_hours, is_active,
             created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(s.subdomain_id),
            s.name,
            s.sla_hours,
            s.is_active,
            encode_dt(s.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_subdomain(
    &self,
    id: Uuid,
  ) -> Result<Option<SubDomain>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawSubdomain> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!(
              "SELECT {SUBDOMAIN_COLS} FROM subdomains WHERE subdomain_id = ?1"
            ),
            rusqlite::params![id_str],
            RawSubdomain::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_subdomain().map_err(CoreError::from))
      .transpose()
  }

  async fn list_subdomains(
    &self,
    page: &PageRequest,
  ) -> Result<Page<SubDomain>, CoreError> {
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawSubdomain>) = self
      .conn
      .call(move |conn| {
        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM subdomains", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBDOMAIN_COLS} FROM subdomains
           ORDER BY name ASC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map([], RawSubdomain::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_subdomain().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn active_subdomains(&self) -> Result<Vec<SubDomain>, CoreError> {
    let raws: Vec<RawSubdomain> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBDOMAIN_COLS} FROM subdomains WHERE is_active = 1
           ORDER BY name ASC"
        ))?;
        let rows = stmt
          .query_map([], RawSubdomain::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws
      .into_iter()
      .map(|r| r.into_subdomain().map_err(CoreError::from))
      .collect()
  }

  async fn update_subdomain(
    &self,
    id: Uuid,
    patch: &SubDomainPatch,
  ) -> Result<SubDomain, CoreError> {
    let id_str = encode_uuid(id);
    let patch = patch.clone();

    let raw: Option<RawSubdomain> = self
      .conn
      .call(move |conn| {
        let hit = conn.execute(
          "UPDATE subdomains SET
             name      = COALESCE(?2, name),
             sla_hours = COALESCE(?3, sla_hours),
             is_active = COALESCE(?4, is_active)
           WHERE subdomain_id = ?1",
          rusqlite::params![id_str, patch.name, patch.sla_hours, patch.is_active],
        )?;
        if hit == 0 {
          return Ok(None);
        }
        conn
          .query_row(
            &format!(
              "SELECT {SUBDOMAIN_COLS} FROM subdomains WHERE subdomain_id = ?1"
            ),
            rusqlite::params![id_str],
            RawSubdomain::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;

    match raw {
      Some(r) => Ok(r.into_subdomain()?),
      None => Err(CoreError::SubdomainNotFound(id)),
    }
  }

  async fn add_subdomain_expert(
    &self,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> Result<(), CoreError> {
    let sd_str = encode_uuid(subdomain_id);
    let expert_str = encode_uuid(expert);

    let exists = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM subdomains WHERE subdomain_id = ?1",
            rusqlite::params![sd_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          conn.execute(
            "INSERT OR IGNORE INTO subdomain_experts (subdomain_id, expert_id)
             VALUES (?1, ?2)",
            rusqlite::params![sd_str, expert_str],
          )?;
        }
        Ok(exists)
      })
      .await
      .map_err(db_err)?;

    if !exists {
      return Err(CoreError::SubdomainNotFound(subdomain_id));
    }
    Ok(())
  }

  async fn remove_subdomain_expert(
    &self,
    subdomain_id: Uuid,
    expert: Uuid,
  ) -> Result<(), CoreError> {
    let sd_str = encode_uuid(subdomain_id);
    let expert_str = encode_uuid(expert);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM subdomain_experts
           WHERE subdomain_id = ?1 AND expert_id = ?2",
          rusqlite::params![sd_str, expert_str],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn list_subdomain_experts(
    &self,
    subdomain_id: Uuid,
  ) -> Result<Vec<Uuid>, CoreError> {
    let sd_str = encode_uuid(subdomain_id);
    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT expert_id FROM subdomain_experts
           WHERE subdomain_id = ?1 ORDER BY expert_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![sd_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    ids
      .iter()
      .map(|s| {
        crate::encode::decode_uuid(s).map_err(CoreError::from)
      })
      .collect()
  }

  // ── Reassignment ──────────────────────────────────────────────────────────

  async fn insert_reassignment(
    &self,
    request: &ReassignmentRequest,
  ) -> Result<(), CoreError> {
    let r = request.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reassignment_requests (request_id, question_id,
             requested_by, current_subdomain_id, suggested_subdomain_id,
             reason, status, reviewed_by, admin_notes, created_at,
             reviewed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            encode_uuid(r.request_id),
            encode_uuid(r.question_id),
            encode_uuid(r.requested_by),
            r.current_subdomain_id.map(encode_uuid),
            encode_uuid(r.suggested_subdomain_id),
            r.reason,
            encode_reassignment_status(r.status),
            r.reviewed_by.map(encode_uuid),
            r.admin_notes,
            encode_dt(r.created_at),
            r.reviewed_at.map(encode_dt),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn get_reassignment(
    &self,
    id: Uuid,
  ) -> Result<Option<ReassignmentRequest>, CoreError> {
    let id_str = encode_uuid(id);
    let raw: Option<RawReassignment> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!(
              "SELECT {REASSIGNMENT_COLS} FROM reassignment_requests
               WHERE request_id = ?1"
            ),
            rusqlite::params![id_str],
            RawReassignment::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_request().map_err(CoreError::from))
      .transpose()
  }

  async fn list_reassignments(
    &self,
    status: Option<ReassignmentStatus>,
    page: &PageRequest,
  ) -> Result<Page<ReassignmentRequest>, CoreError> {
    let status_str = status.map(|s| encode_reassignment_status(s).to_owned());
    let limit = page.limit();
    let offset = page.offset();
    let page_req = *page;

    let (total, raws): (u64, Vec<RawReassignment>) = self
      .conn
      .call(move |conn| {
        let (where_clause, params): (&str, Vec<String>) = match &status_str {
          Some(s) => ("WHERE status = ?1", vec![s.clone()]),
          None => ("", vec![]),
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM reassignment_requests {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {REASSIGNMENT_COLS} FROM reassignment_requests {where_clause}
           ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter()),
            RawReassignment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total as u64, rows))
      })
      .await
      .map_err(db_err)?;

    let items = raws
      .into_iter()
      .map(|r| r.into_request().map_err(CoreError::from))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, &page_req))
  }

  async fn pending_reassignment_for(
    &self,
    question_id: Uuid,
  ) -> Result<Option<ReassignmentRequest>, CoreError> {
    let q_str = encode_uuid(question_id);
    let raw: Option<RawReassignment> = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &format!(
              "SELECT {REASSIGNMENT_COLS} FROM reassignment_requests
               WHERE question_id = ?1 AND status = 'pending'"
            ),
            rusqlite::params![q_str],
            RawReassignment::from_row,
          )
          .optional()
          .map_err(Into::into)
      })
      .await
      .map_err(db_err)?;
    raw
      .map(|r| r.into_request().map_err(CoreError::from))
      .transpose()
  }

  async fn review_reassignment(
    &self,
    request_id: Uuid,
    approve: bool,
    notes: Option<&str>,
    reviewer: Uuid,
    now: chrono::DateTime<chrono::Utc>,
  ) -> Result<(ReassignmentRequest, Option<Question>), CoreError> {
    let id_str = encode_uuid(request_id);
    let reviewer_str = encode_uuid(reviewer);
    let notes = notes.map(str::to_owned);
    let now_str = encode_dt(now);
    let human_origin =
      encode_route_origin(&quill_core::question::RouteOrigin::Human)?;

    enum Outcome {
      Missing,
      Terminal,
      Reviewed(RawReassignment, Option<RawQuestion>),
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<RawReassignment> = tx
          .query_row(
            &format!(
              "SELECT {REASSIGNMENT_COLS} FROM reassignment_requests
               WHERE request_id = ?1"
            ),
            rusqlite::params![id_str],
            RawReassignment::from_row,
          )
          .optional()?;

        let Some(current) = current else {
          return Ok(Outcome::Missing);
        };
        if current.status != "pending" {
          return Ok(Outcome::Terminal);
        }

        let new_status = if approve { "approved" } else { "rejected" };
        tx.execute(
          "UPDATE reassignment_requests
             SET status = ?2, reviewed_by = ?3, admin_notes = ?4,
                 reviewed_at = ?5
           WHERE request_id = ?1",
          rusqlite::params![id_str, new_status, reviewer_str, notes, now_str],
        )?;

        let question = if approve {
          tx.execute(
            "UPDATE questions
               SET subdomain_id = ?2, routed_at = ?3, routing_origin = ?4,
                   version = version + 1
             WHERE question_id = ?1",
            rusqlite::params![
              current.question_id,
              current.suggested_subdomain_id,
              now_str,
              human_origin,
            ],
          )?;
          select_question_row(&tx, &current.question_id)?
        } else {
          None
        };

        let reviewed = tx.query_row(
          &format!(
            "SELECT {REASSIGNMENT_COLS} FROM reassignment_requests
             WHERE request_id = ?1"
          ),
          rusqlite::params![id_str],
          RawReassignment::from_row,
        )?;

        tx.commit()?;
        Ok(Outcome::Reviewed(reviewed, question))
      })
      .await
      .map_err(db_err)?;

    match outcome {
      Outcome::Missing => Err(CoreError::RequestNotFound(request_id)),
      Outcome::Terminal => Err(CoreError::AlreadyReviewed(request_id)),
      Outcome::Reviewed(raw_req, raw_q) => {
        let request = raw_req.into_request()?;
        let question = raw_q
          .map(|r| r.into_question().map_err(CoreError::from))
          .transpose()?;
        Ok((request, question))
      }
    }
  }

  // ── Escalations ───────────────────────────────────────────────────────────

  async fn record_escalation(
    &self,
    question_id: Uuid,
    window_start: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
  ) -> Result<bool, CoreError> {
    let esc_id = encode_uuid(Uuid::new_v4());
    let q_str = encode_uuid(question_id);
    let window_str = encode_dt(window_start);
    let now_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO escalations (escalation_id, question_id,
             window_start, emitted_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![esc_id, q_str, window_str, now_str],
        )?;
        Ok(inserted == 1)
      })
      .await
      .map_err(db_err)
  }

  async fn sla_watchlist(&self) -> Result<Vec<SlaEntry>, CoreError> {
    let rows: Vec<(RawQuestion, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, s.sla_hours
           FROM questions q
           JOIN subdomains s ON s.subdomain_id = q.subdomain_id
           WHERE q.status IN ('expert_queue', 'human_requested',
                              'in_progress', 'needs_clarification')",
          prefixed_question_cols()
        ))?;
        let rows = stmt
          .query_map([], |row| {
            Ok((RawQuestion::from_row(row)?, row.get(16)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    rows
      .into_iter()
      .map(|(raw, sla_hours)| {
        Ok(SlaEntry { question: raw.into_question()?, sla_hours })
      })
      .collect()
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn db_err(e: tokio_rusqlite::Error) -> CoreError {
  crate::Error::Database(e).into()
}

fn prefixed_question_cols() -> String {
  QUESTION_COLS
    .split(", ")
    .map(|c| format!("q.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}

enum CandidateOutcome {
  Missing,
  Terminal,
  Updated(RawCandidate),
}

fn candidate_status(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT validation_status FROM candidates WHERE candidate_id = ?1",
      rusqlite::params![id],
      |row| row.get(0),
    )
    .optional()
}

fn is_terminal_status(s: &str) -> bool {
  matches!(s, "approved" | "rejected")
}

fn resolve_candidate_outcome(
  outcome: CandidateOutcome,
  id: Uuid,
) -> Result<ExtractedFactCandidate, CoreError> {
  match outcome {
    CandidateOutcome::Missing => Err(CoreError::CandidateNotFound(id)),
    CandidateOutcome::Terminal => Err(CoreError::CandidateAlreadyValidated(id)),
    CandidateOutcome::Updated(raw) => Ok(raw.into_candidate()?),
  }
}
