//! AutomationMatcher — scoring incoming questions against the curated rule
//! corpus.
//!
//! The matcher only ever reads rules and bumps counters. Its acceptance
//! floor is system-wide and fixed in configuration, independent of any
//! per-question turbo threshold.

use quill_core::{
  Result,
  automation::{AutomationRule, NewAutomationRule},
  identity::Identity,
  model::SemanticModel,
  page::{Page, PageRequest},
  question::AutomationSuggestion,
  store::TriageStore,
};
use chrono::Utc;
use uuid::Uuid;

use crate::Engine;

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  /// Best enabled rule at or above the acceptance floor, or `None`.
  /// Model failures bubble as upstream errors; the submission path catches
  /// them and degrades to no-match.
  pub(crate) async fn match_rules(
    &self,
    text: &str,
  ) -> Result<Option<AutomationSuggestion>> {
    let rules = self.store().enabled_rules().await?;
    let floor = self.config().automation_floor;

    let mut best: Option<(f64, &AutomationRule)> = None;
    for rule in &rules {
      let similarity = self
        .guarded(
          "rule matching",
          self.model().similarity(text, &rule.trigger_text),
        )
        .await?;
      if similarity >= floor
        && best.is_none_or(|(top, _)| similarity > top)
      {
        best = Some((similarity, rule));
      }
    }

    Ok(best.map(|(similarity, rule)| AutomationSuggestion {
      rule_id: rule.rule_id,
      suggested_answer: rule.answer_text.clone(),
      similarity,
    }))
  }

  // ── Admin surface ─────────────────────────────────────────────────────

  pub async fn create_rule(
    &self,
    identity: Identity,
    input: NewAutomationRule,
  ) -> Result<AutomationRule> {
    if !identity.is_admin() {
      return Err(quill_core::Error::AdminOnly { action: "rule creation" });
    }
    let rule = AutomationRule {
      rule_id:         Uuid::new_v4(),
      trigger_text:    input.trigger_text,
      answer_text:     input.answer_text,
      enabled:         input.enabled,
      times_triggered: 0,
      times_accepted:  0,
      times_rejected:  0,
      created_at:      Utc::now(),
    };
    self.store().insert_rule(&rule).await?;
    Ok(rule)
  }

  pub async fn list_rules(
    &self,
    page: &PageRequest,
  ) -> Result<Page<AutomationRule>> {
    self.store().list_rules(page).await
  }

  pub async fn set_rule_enabled(
    &self,
    identity: Identity,
    rule_id: Uuid,
    enabled: bool,
  ) -> Result<AutomationRule> {
    if !identity.is_admin() {
      return Err(quill_core::Error::AdminOnly { action: "rule toggling" });
    }
    self.store().set_rule_enabled(rule_id, enabled).await
  }
}
