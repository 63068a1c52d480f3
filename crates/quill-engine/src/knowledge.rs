//! Knowledge store operations — authoring, tiering, search, and the usage
//! policy hook.

use chrono::Utc;
use quill_core::{
  Error, Result,
  identity::Identity,
  model::SemanticModel,
  page::{Page, PageRequest},
  store::TriageStore,
  wisdom::{FactTier, NewWisdomFact, WisdomFact},
};
use serde::Serialize;
use uuid::Uuid;

use crate::Engine;

/// A search hit: the fact with its similarity to the query.
#[derive(Debug, Serialize)]
pub struct RankedFact {
  pub fact:       WisdomFact,
  pub similarity: f64,
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  /// Expert fact authoring. Tier is assigned here — trust is decided at
  /// creation, not by later content edits.
  pub async fn author_fact(
    &self,
    identity: Identity,
    input: NewWisdomFact,
  ) -> Result<WisdomFact> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "fact authoring" });
    }
    validate_fact_numbers(input.confidence_score, input.importance)?;

    let fact = WisdomFact {
      fact_id:            Uuid::new_v4(),
      content:            input.content,
      tier:               input.tier,
      confidence_score:   input.confidence_score,
      importance:         input.importance,
      lifetime:           input.lifetime,
      usage_count:        0,
      last_used_at:       None,
      source_answer_id:   input.source_answer_id,
      source_document_id: input.source_document_id,
      created_at:         Utc::now(),
    };
    self.store().insert_fact(&fact).await?;
    Ok(fact)
  }

  pub async fn get_fact(&self, id: Uuid) -> Result<WisdomFact> {
    self
      .store()
      .get_fact(id)
      .await?
      .ok_or(Error::FactNotFound(id))
  }

  pub async fn list_facts(
    &self,
    tier: Option<FactTier>,
    page: &PageRequest,
  ) -> Result<Page<WisdomFact>> {
    self.store().list_facts(tier, page).await
  }

  /// Explicit promote/demote — the only tier mutation outside the
  /// installed policy.
  pub async fn set_fact_tier(
    &self,
    identity: Identity,
    id: Uuid,
    tier: FactTier,
  ) -> Result<WisdomFact> {
    if !identity.is_expert() {
      return Err(Error::ExpertOnly { action: "tier changes" });
    }
    self.store().set_fact_tier(id, tier).await
  }

  /// Manual soft-delete.
  pub async fn archive_fact(
    &self,
    identity: Identity,
    id: Uuid,
  ) -> Result<WisdomFact> {
    self.set_fact_tier(identity, id, FactTier::Archived).await
  }

  /// Semantic search over everything non-archived. This is the one surface
  /// that reports a slow scorer to the caller instead of degrading — there
  /// is no safe default for a search result.
  pub async fn search_facts(
    &self,
    text: &str,
    limit: usize,
  ) -> Result<Vec<RankedFact>> {
    let facts = self.store().searchable_facts().await?;
    let scores = self
      .guarded("semantic search", self.model().score_facts(text, &facts))
      .await?;

    let mut ranked: Vec<RankedFact> = scores
      .into_iter()
      .filter(|s| s.similarity > 0.0)
      .filter_map(|s| {
        facts
          .iter()
          .find(|f| f.fact_id == s.fact_id)
          .map(|f| RankedFact { fact: f.clone(), similarity: s.similarity })
      })
      .collect();
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(limit);
    Ok(ranked)
  }

  /// Consult the installed tier policy for every fact that just
  /// contributed to an automated answer.
  pub(crate) async fn apply_usage_policy(
    &self,
    facts: &[WisdomFact],
    used: &[Uuid],
  ) -> Result<()> {
    for fact in facts.iter().filter(|f| used.contains(&f.fact_id)) {
      if let Some(tier) = self.tier_policy().after_usage(fact) {
        if tier != fact.tier {
          tracing::info!(
            fact = %fact.fact_id, from = %fact.tier, to = %tier,
            "tier policy moved fact"
          );
          self.store().set_fact_tier(fact.fact_id, tier).await?;
        }
      }
    }
    Ok(())
  }
}

pub(crate) fn validate_fact_numbers(
  confidence: f64,
  importance: u8,
) -> Result<()> {
  if !(0.0..=1.0).contains(&confidence) {
    return Err(Error::ConfidenceOutOfRange(confidence));
  }
  if !(1..=10).contains(&importance) {
    return Err(Error::ImportanceOutOfRange(importance));
  }
  Ok(())
}
