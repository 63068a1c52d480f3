//! TurboDecision — the threshold-gated knowledge answer path.
//!
//! The caller opts in per question and names a threshold from the
//! configured option set. Composite confidence per fact is
//! `similarity × tier trust weight × fact confidence`; the decision accepts
//! iff the best composite reaches the threshold (boundary inclusive). Every
//! accepted answer carries attributions — an automated answer without them
//! is invalid.

use quill_core::{
  Result,
  model::{ScoredFact, SemanticModel},
  question::KnowledgeAnalysis,
  store::TriageStore,
  wisdom::{Attribution, ContributionKind, WisdomFact},
};
use serde::Serialize;

use crate::{Engine, lexical::tokens};

/// Result of the turbo gate, surfaced verbatim to the submitter.
#[derive(Debug, Clone, Serialize)]
pub struct TurboOutcome {
  pub answered:     bool,
  pub confidence:   f64,
  pub attributions: Vec<Attribution>,
}

/// Everything one scoring pass over the knowledge store yields: the gap
/// analysis half, the attribution list, and the proposed answer text of the
/// primary fact (when anything relevant surfaced).
#[derive(Debug, Clone)]
pub(crate) struct KnowledgeVerdict {
  pub analysis:        KnowledgeAnalysis,
  pub attributions:    Vec<Attribution>,
  pub proposed_answer: Option<String>,
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  /// Reject thresholds outside the configured option set — at the boundary,
  /// never by clamping.
  pub(crate) fn validate_threshold(&self, threshold: f64) -> Result<()> {
    if self.config().is_configured_threshold(threshold) {
      Ok(())
    } else {
      Err(quill_core::Error::ThresholdNotConfigured(threshold))
    }
  }

  /// Fold raw per-fact similarities into a [`KnowledgeVerdict`]. Pure —
  /// scoring already happened; this only weighs, ranks, and measures
  /// coverage.
  pub(crate) fn analyse_knowledge(
    &self,
    text: &str,
    facts: &[WisdomFact],
    scores: Vec<ScoredFact>,
  ) -> KnowledgeVerdict {
    let floor = self.config().relevance_floor;

    // Composite-weighted contributions above the relevance floor.
    let mut contributions: Vec<(&WisdomFact, f64, f64)> = scores
      .iter()
      .filter(|s| s.similarity >= floor)
      .filter_map(|s| {
        facts.iter().find(|f| f.fact_id == s.fact_id).map(|f| {
          let composite =
            s.similarity * f.tier.trust_weight() * f.confidence_score;
          (f, s.similarity, composite)
        })
      })
      .collect();
    contributions.sort_by(|a, b| b.2.total_cmp(&a.2));

    let attributions: Vec<Attribution> = contributions
      .iter()
      .enumerate()
      .map(|(i, (f, similarity, _))| Attribution {
        fact_id:      f.fact_id,
        contribution: if i == 0 {
          ContributionKind::Primary
        } else {
          ContributionKind::Supporting
        },
        similarity:   *similarity,
      })
      .collect();

    // Coverage: which question terms any contributing fact speaks to.
    let question_terms = tokens(text);
    let mut gaps: Vec<String> = Vec::new();
    let mut covered = 0usize;
    for term in &question_terms {
      let hit = contributions
        .iter()
        .any(|(f, ..)| tokens(&f.content).contains(term));
      if hit {
        covered += 1;
      } else {
        gaps.push(term.clone());
      }
    }
    let coverage = if question_terms.is_empty() {
      0.0
    } else {
      covered as f64 / question_terms.len() as f64
    };

    let confidence = contributions.first().map_or(0.0, |(.., c)| *c);
    let proposed_answer =
      contributions.first().map(|(f, ..)| f.content.clone());

    KnowledgeVerdict {
      analysis: KnowledgeAnalysis {
        coverage,
        confidence,
        relevant_fact_ids: contributions
          .iter()
          .map(|(f, ..)| f.fact_id)
          .collect(),
        gaps,
        proposed_answer: proposed_answer.clone(),
      },
      attributions,
      proposed_answer,
    }
  }

  /// The gate itself: accept iff the best composite reaches the threshold.
  pub(crate) fn decide_turbo(
    &self,
    verdict: &KnowledgeVerdict,
    threshold: f64,
  ) -> TurboOutcome {
    let confidence = verdict.analysis.confidence;
    let answered =
      verdict.proposed_answer.is_some() && confidence >= threshold;
    TurboOutcome {
      answered,
      confidence,
      attributions: verdict.attributions.clone(),
    }
  }
}
