//! Shared fixtures for engine tests: a scriptable [`SemanticModel`] stub
//! and an in-memory engine.

use quill_core::{
  identity::Identity,
  model::{
    CandidateDraft, Classification, ModelError, ScoredFact, SemanticModel,
  },
  question::NewQuestion,
  routing::SubDomain,
  wisdom::WisdomFact,
};
use quill_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{Engine, EngineConfig, questions::SubmitOutcome};

/// A fully scripted model: fixed similarities, a fixed classification, and
/// canned extraction drafts. `hang` parks every call until the engine's
/// timeout fires.
#[derive(Clone)]
pub(crate) struct StaticModel {
  pub rule_similarity: f64,
  pub fact_similarity: f64,
  pub classification:  Option<(Uuid, f64)>,
  pub drafts:          Vec<(f64, &'static str)>,
  pub hang:            bool,
}

impl Default for StaticModel {
  fn default() -> Self {
    Self {
      rule_similarity: 0.0,
      fact_similarity: 0.0,
      classification:  None,
      drafts:          Vec::new(),
      hang:            false,
    }
  }
}

impl StaticModel {
  async fn maybe_hang(&self) {
    if self.hang {
      tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    }
  }
}

impl SemanticModel for StaticModel {
  async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, ModelError> {
    self.maybe_hang().await;
    Ok(self.rule_similarity)
  }

  async fn score_facts(
    &self,
    _text: &str,
    facts: &[WisdomFact],
  ) -> Result<Vec<ScoredFact>, ModelError> {
    self.maybe_hang().await;
    Ok(
      facts
        .iter()
        .map(|f| ScoredFact {
          fact_id:    f.fact_id,
          similarity: self.fact_similarity,
        })
        .collect(),
    )
  }

  async fn classify(
    &self,
    _text: &str,
    _options: &[SubDomain],
  ) -> Result<Option<Classification>, ModelError> {
    self.maybe_hang().await;
    Ok(
      self
        .classification
        .map(|(subdomain_id, confidence)| Classification {
          subdomain_id,
          confidence,
        }),
    )
  }

  async fn parse_document(&self, raw: &str) -> Result<String, ModelError> {
    self.maybe_hang().await;
    Ok(raw.to_owned())
  }

  async fn extract_candidates(
    &self,
    _text: &str,
  ) -> Result<Vec<CandidateDraft>, ModelError> {
    self.maybe_hang().await;
    Ok(
      self
        .drafts
        .iter()
        .map(|(confidence, text)| CandidateDraft {
          fact_text:  (*text).to_owned(),
          confidence: *confidence,
        })
        .collect(),
    )
  }
}

// ─── Engine fixtures ─────────────────────────────────────────────────────────

pub(crate) async fn mem_engine(
  model: StaticModel,
) -> Engine<SqliteStore, StaticModel> {
  mem_engine_with(model, EngineConfig::default()).await
}

pub(crate) async fn mem_engine_with(
  model: StaticModel,
  config: EngineConfig,
) -> Engine<SqliteStore, StaticModel> {
  let store = SqliteStore::open_in_memory().await.expect("store");
  Engine::new(store, model, config)
}

impl Engine<SqliteStore, StaticModel> {
  /// Rebuild this engine over the same database with the stub classifier
  /// pointed at `subdomain_id`.
  pub(crate) fn reclassify_to(
    self,
    subdomain_id: Uuid,
    confidence: f64,
  ) -> Self {
    let mut model = self.model.clone();
    model.classification = Some((subdomain_id, confidence));
    Engine::new(self.store.clone(), model, self.config.clone())
  }
}

pub(crate) fn admin() -> Identity { Identity::admin(Uuid::new_v4()) }

pub(crate) fn expert() -> Identity { Identity::expert(Uuid::new_v4()) }

/// Submit a plain question (no sub-domain, no turbo).
pub(crate) async fn submit_plain(
  engine: &Engine<SqliteStore, StaticModel>,
  text: &str,
) -> SubmitOutcome {
  engine
    .submit(
      Identity::requester(Uuid::new_v4()),
      NewQuestion {
        text:            text.into(),
        subdomain_id:    None,
        category:        None,
        priority:        Default::default(),
        turbo_mode:      false,
        turbo_threshold: None,
      },
    )
    .await
    .expect("submission")
}

/// Submit a question routed explicitly into `subdomain_id`.
pub(crate) async fn submit_routed(
  engine: &Engine<SqliteStore, StaticModel>,
  text: &str,
  subdomain_id: Uuid,
) -> SubmitOutcome {
  engine
    .submit(
      Identity::requester(Uuid::new_v4()),
      NewQuestion {
        text:            text.into(),
        subdomain_id:    Some(subdomain_id),
        category:        None,
        priority:        Default::default(),
        turbo_mode:      false,
        turbo_threshold: None,
      },
    )
    .await
    .expect("submission")
}

/// Author a perpetual, scorable fact with the given confidence.
pub(crate) async fn seed_fact(
  engine: &Engine<SqliteStore, StaticModel>,
  content: &str,
  tier: quill_core::wisdom::FactTier,
  confidence: f64,
) -> quill_core::wisdom::WisdomFact {
  engine
    .author_fact(
      expert(),
      quill_core::wisdom::NewWisdomFact {
        content:            content.into(),
        tier,
        confidence_score:   confidence,
        importance:         5,
        lifetime:           quill_core::wisdom::Lifetime::Perpetual,
        source_answer_id:   None,
        source_document_id: None,
      },
    )
    .await
    .expect("fact")
}

/// Create an enabled automation rule.
pub(crate) async fn seed_rule(
  engine: &Engine<SqliteStore, StaticModel>,
  trigger: &str,
  answer: &str,
) -> quill_core::automation::AutomationRule {
  engine
    .create_rule(
      admin(),
      quill_core::automation::NewAutomationRule {
        trigger_text: trigger.into(),
        answer_text:  answer.into(),
        enabled:      true,
      },
    )
    .await
    .expect("rule")
}

/// Upload a perpetual document as a fresh expert.
pub(crate) async fn upload(
  engine: &Engine<SqliteStore, StaticModel>,
  content: &str,
) -> quill_core::document::KnowledgeDocument {
  engine
    .upload_document(
      expert(),
      quill_core::document::NewDocument {
        title:                 "fixture".into(),
        content:               content.into(),
        lifetime:              quill_core::wisdom::Lifetime::Perpetual,
        auto_delete_on_expiry: false,
      },
    )
    .await
    .expect("upload")
}
