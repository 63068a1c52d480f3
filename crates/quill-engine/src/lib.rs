//! The Quill triage engine — orchestration over a [`TriageStore`] and a
//! [`SemanticModel`].
//!
//! The engine owns the question state machine and every operation the
//! platform exposes: submission with its two automated-answer paths, expert
//! actions, knowledge authoring and search, the document extraction
//! pipeline, sub-domain routing with the reassignment workflow, and the
//! periodic maintenance pass (SLA scan, expiry sweeps).
//!
//! Every semantic-model call made on a request path runs under a timeout;
//! on timeout or error the engine fails open to the safe default rather
//! than failing the primary operation.

pub mod automation;
pub mod config;
pub mod extraction;
pub mod knowledge;
pub mod lexical;
pub mod maintenance;
pub mod policy;
pub mod questions;
pub mod routing;
pub mod turbo;

use std::future::Future;

use quill_core::{
  Error, Result,
  model::{ModelError, SemanticModel},
  question::{Question, QuestionStatus},
  store::TriageStore,
};
use uuid::Uuid;

pub use config::{AnswerPrecedence, EngineConfig};
pub use lexical::LexicalModel;
pub use maintenance::{EscalationSink, TracingSink};
pub use policy::{ManualTierPolicy, TierPolicy};

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The orchestrator. Generic over the storage backend and the semantic
/// model; holds the pluggable tier policy and escalation sink as trait
/// objects so operators can swap them without re-instantiating the stack.
pub struct Engine<S, M> {
  store:       S,
  model:       M,
  config:      EngineConfig,
  tier_policy: Box<dyn TierPolicy>,
  sink:        Box<dyn EscalationSink>,
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  pub fn new(store: S, model: M, config: EngineConfig) -> Self {
    Self {
      store,
      model,
      config,
      tier_policy: Box::new(ManualTierPolicy),
      sink: Box::new(TracingSink),
    }
  }

  /// Install a tier promotion/demotion policy.
  pub fn with_tier_policy(mut self, policy: Box<dyn TierPolicy>) -> Self {
    self.tier_policy = policy;
    self
  }

  /// Install an escalation sink (defaults to structured logging).
  pub fn with_escalation_sink(mut self, sink: Box<dyn EscalationSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub(crate) fn store(&self) -> &S { &self.store }

  pub(crate) fn model(&self) -> &M { &self.model }

  pub(crate) fn tier_policy(&self) -> &dyn TierPolicy { &*self.tier_policy }

  pub(crate) fn sink(&self) -> &dyn EscalationSink { &*self.sink }

  // ── Shared helpers ────────────────────────────────────────────────────

  /// Fetch a question or fail with `QuestionNotFound`.
  pub(crate) async fn fetch_question(&self, id: Uuid) -> Result<Question> {
    self
      .store
      .get_question(id)
      .await?
      .ok_or(Error::QuestionNotFound(id))
  }

  /// Apply a status transition in memory, guarded by the transition graph.
  pub(crate) fn transition(
    &self,
    question: &mut Question,
    to: QuestionStatus,
  ) -> Result<()> {
    if !question.status.can_transition(to) {
      return Err(Error::InvalidTransition { from: question.status, to });
    }
    question.status = to;
    Ok(())
  }

  /// Run a semantic-model call under the configured timeout, collapsing
  /// timeouts and model failures into the upstream error variants. Callers
  /// on the submission path catch these and degrade.
  pub(crate) async fn guarded<T>(
    &self,
    what: &'static str,
    fut: impl Future<Output = Result<T, ModelError>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.config.model_timeout(), fut).await {
      Err(_) => Err(Error::UpstreamTimeout(what)),
      Ok(Err(e)) => Err(Error::Upstream(e.to_string())),
      Ok(Ok(v)) => Ok(v),
    }
  }
}

#[cfg(test)]
pub(crate) mod testutil;
