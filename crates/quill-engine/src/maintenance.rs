//! The periodic maintenance pass: SLA scan, fact expiry sweep, and
//! expired-document deletion.
//!
//! The server binary drives this on a tokio interval; nothing here is
//! request-driven. Escalation delivery goes through a pluggable sink —
//! transport belongs to the external notification system.

use chrono::{DateTime, Duration, Utc};
use quill_core::{
  Result, model::SemanticModel, question::Question, store::TriageStore,
};

use crate::Engine;

/// Consumer of SLA breach events. Emission is exactly-once per
/// (question, window); delivery downstream is best-effort.
pub trait EscalationSink: Send + Sync {
  fn escalate(&self, question: &Question, sla_hours: i64, elapsed: Duration);
}

/// Default sink: structured log lines.
pub struct TracingSink;

impl EscalationSink for TracingSink {
  fn escalate(&self, question: &Question, sla_hours: i64, elapsed: Duration) {
    tracing::warn!(
      question = %question.question_id,
      sla_hours,
      elapsed_hours = elapsed.num_hours(),
      "SLA breached"
    );
  }
}

impl<S, M> Engine<S, M>
where
  S: TriageStore,
  M: SemanticModel,
{
  /// Compare every watched question against its sub-domain SLA and emit an
  /// escalation for each newly-breached window. A question already
  /// escalated in the same window is skipped; an approved reassignment
  /// starts a new window and may escalate again. Returns how many events
  /// were emitted.
  pub async fn run_sla_scan(&self, now: DateTime<Utc>) -> Result<u64> {
    let watchlist = self.store().sla_watchlist().await?;
    let mut emitted = 0u64;

    for entry in &watchlist {
      let window_start = entry.question.routed_at;
      let deadline = window_start + Duration::hours(entry.sla_hours);
      if now <= deadline {
        continue;
      }
      let fresh = self
        .store()
        .record_escalation(entry.question.question_id, window_start, now)
        .await?;
      if fresh {
        self
          .sink()
          .escalate(&entry.question, entry.sla_hours, now - window_start);
        emitted += 1;
      }
    }
    Ok(emitted)
  }

  /// Archive expired facts and delete expired opted-in documents.
  /// Archival is soft; the only hard deletion is the per-document opt-in.
  pub async fn run_expiry_sweep(
    &self,
    now: DateTime<Utc>,
  ) -> Result<(u64, u64)> {
    let archived = self.store().archive_expired_facts(now).await?;
    let deleted = self.store().delete_expired_documents(now).await?;
    if archived > 0 || deleted > 0 {
      tracing::info!(archived, deleted, "expiry sweep");
    }
    Ok((archived, deleted))
  }

  /// One full maintenance tick.
  pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<()> {
    let emitted = self.run_sla_scan(now).await?;
    let (archived, deleted) = self.run_expiry_sweep(now).await?;
    tracing::debug!(emitted, archived, deleted, "maintenance tick");
    Ok(())
  }
}
