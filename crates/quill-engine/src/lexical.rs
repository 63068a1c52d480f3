//! Deterministic lexical baseline for the [`SemanticModel`] seam.
//!
//! Token-overlap scoring, the same phase-1 approach as plain SQL LIKE
//! search: no external service, fully reproducible, good enough to run the
//! whole engine end to end. Deployments swap in a real embedding backend by
//! implementing [`SemanticModel`] themselves.

use std::collections::BTreeSet;

use quill_core::{
  model::{
    CandidateDraft, Classification, ModelError, ScoredFact, SemanticModel,
  },
  routing::SubDomain,
  wisdom::WisdomFact,
};

const STOPWORDS: &[&str] = &[
  "the", "and", "for", "with", "this", "that", "you", "your", "can", "are",
  "does", "how", "what", "why", "where", "when", "from", "into", "not",
];

/// Lowercased alphanumeric tokens, stopwords and short words dropped.
pub(crate) fn tokens(text: &str) -> BTreeSet<String> {
  text
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
    .map(str::to_owned)
    .collect()
}

/// Jaccard overlap of the two token sets.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  let intersection = a.intersection(b).count();
  let union = a.len() + b.len() - intersection;
  intersection as f64 / union as f64
}

/// Fraction of `of`'s tokens present in `within`.
fn containment(of: &BTreeSet<String>, within: &BTreeSet<String>) -> f64 {
  if of.is_empty() {
    return 0.0;
  }
  let hits = of.iter().filter(|t| within.contains(*t)).count();
  hits as f64 / of.len() as f64
}

pub struct LexicalModel;

impl SemanticModel for LexicalModel {
  async fn similarity(&self, a: &str, b: &str) -> Result<f64, ModelError> {
    Ok(jaccard(&tokens(a), &tokens(b)))
  }

  async fn score_facts(
    &self,
    text: &str,
    facts: &[WisdomFact],
  ) -> Result<Vec<ScoredFact>, ModelError> {
    let query = tokens(text);
    Ok(
      facts
        .iter()
        .map(|f| ScoredFact {
          fact_id:    f.fact_id,
          similarity: jaccard(&query, &tokens(&f.content)),
        })
        .collect(),
    )
  }

  async fn classify(
    &self,
    text: &str,
    options: &[SubDomain],
  ) -> Result<Option<Classification>, ModelError> {
    let query = tokens(text);
    let best = options
      .iter()
      .map(|sd| (sd, containment(&tokens(&sd.name), &query)))
      .filter(|(_, score)| *score > 0.0)
      .max_by(|a, b| a.1.total_cmp(&b.1));

    Ok(best.map(|(sd, confidence)| Classification {
      subdomain_id: sd.subdomain_id,
      confidence,
    }))
  }

  async fn parse_document(&self, raw: &str) -> Result<String, ModelError> {
    // Normalise whitespace; drop empty lines.
    let text = raw
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .collect::<Vec<_>>()
      .join("\n");
    if text.is_empty() {
      return Err(ModelError("document has no textual content".into()));
    }
    Ok(text)
  }

  async fn extract_candidates(
    &self,
    text: &str,
  ) -> Result<Vec<CandidateDraft>, ModelError> {
    let drafts = text
      .split(['.', '!', '?', '\n'])
      .map(str::trim)
      .filter(|s| tokens(s).len() >= 3)
      .map(|s| {
        let weight = tokens(s).len() as f64;
        CandidateDraft {
          fact_text:  format!("{s}."),
          confidence: (weight / 12.0).clamp(0.3, 0.9),
        }
      })
      .collect();
    Ok(drafts)
  }
}
