//! Pluggable tier promotion/demotion policy.
//!
//! Whether tier movement is usage-driven or purely manual is an operator
//! decision; the engine consults the installed policy after every usage
//! touch and applies whatever it proposes. The shipped default never moves
//! a tier, leaving the explicit promote/demote operation as the only path.

use quill_core::wisdom::{FactTier, WisdomFact};

pub trait TierPolicy: Send + Sync {
  /// Called after `fact` contributed to an automated answer. Return a new
  /// tier to move the fact, or `None` to leave it alone.
  fn after_usage(&self, fact: &WisdomFact) -> Option<FactTier>;
}

/// Manual-only tiering: usage never moves a fact.
pub struct ManualTierPolicy;

impl TierPolicy for ManualTierPolicy {
  fn after_usage(&self, _fact: &WisdomFact) -> Option<FactTier> { None }
}
