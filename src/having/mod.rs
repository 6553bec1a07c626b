//! HAVING evaluation over the completed H-table
//!
//! The clause is parsed once per query into a `HavingExpr` and evaluated per
//! group against the group's finalized aggregates. When a group cannot be
//! evaluated (unknown identifier, division by zero, unparseable clause) the
//! configured `HavingPolicy` decides whether it is kept.

mod expr;

pub use expr::*;

use crate::error::Result;
use crate::mf::MfStructure;
use crate::spec::is_empty_clause;
use tracing::{debug, warn};

/// What to do with a group whose HAVING predicate could not be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HavingPolicy {
    /// Keep the group. Groups whose predicate was never verified can
    /// appear in the output.
    #[default]
    FailOpen,
    /// Drop the group
    FailClosed,
}

impl HavingPolicy {
    pub fn retains_on_error(&self) -> bool {
        matches!(self, HavingPolicy::FailOpen)
    }
}

/// Counters from one HAVING pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HavingStats {
    pub evaluated: usize,
    pub retained: usize,
    pub dropped: usize,
    /// Groups decided by the policy because evaluation failed
    pub failed: usize,
}

/// Compiled HAVING clause plus its failure policy
#[derive(Debug, Clone)]
pub struct HavingEvaluator {
    clause: Clause,
    policy: HavingPolicy,
}

#[derive(Debug, Clone)]
enum Clause {
    None,
    Expr(HavingExpr),
    /// Parse failed; every group falls back to the policy
    Invalid(String),
}

impl HavingEvaluator {
    pub fn new(having: &str, policy: HavingPolicy) -> Self {
        let clause = if is_empty_clause(having) {
            Clause::None
        } else {
            match HavingExpr::parse(having) {
                Ok(expr) => Clause::Expr(expr),
                Err(e) => {
                    warn!(having, error = %e, "HAVING clause could not be parsed");
                    Clause::Invalid(e.to_string())
                }
            }
        };
        Self { clause, policy }
    }

    /// Parse strictly, surfacing the parse error instead of deferring it
    pub fn try_new(having: &str, policy: HavingPolicy) -> Result<Self> {
        let clause = if is_empty_clause(having) {
            Clause::None
        } else {
            Clause::Expr(HavingExpr::parse(having)?)
        };
        Ok(Self { clause, policy })
    }

    pub fn policy(&self) -> HavingPolicy {
        self.policy
    }

    pub fn expr(&self) -> Option<&HavingExpr> {
        match &self.clause {
            Clause::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    /// Filter the H-table in place
    pub fn apply(&self, mf: &mut MfStructure) -> HavingStats {
        let mut stats = HavingStats::default();
        if matches!(self.clause, Clause::None) {
            stats.evaluated = mf.len();
            stats.retained = mf.len();
            return stats;
        }

        let spec = mf.shared_spec();
        let policy = self.policy;
        let clause = &self.clause;

        mf.retain(|key, entry| {
            stats.evaluated += 1;
            let lookup = |id: &str| {
                spec.aggregate_index(id)
                    .and_then(|i| entry.state(i))
                    .map(|s| s.finalize_f64())
            };

            let outcome = match clause {
                Clause::Expr(expr) => expr.is_satisfied(&lookup).map_err(|e| e.to_string()),
                Clause::Invalid(msg) => Err(msg.clone()),
                Clause::None => Ok(true),
            };

            let keep = match outcome {
                Ok(keep) => keep,
                Err(error) => {
                    stats.failed += 1;
                    let keep = policy.retains_on_error();
                    warn!(
                        group = %key,
                        %error,
                        retained = keep,
                        "HAVING could not be evaluated for group"
                    );
                    keep
                }
            };

            if keep {
                stats.retained += 1;
            } else {
                stats.dropped += 1;
            }
            keep
        });

        debug!(
            evaluated = stats.evaluated,
            retained = stats.retained,
            dropped = stats.dropped,
            failed = stats.failed,
            "HAVING applied"
        );
        stats
    }
}

/// Apply `having` to the H-table under `policy`
pub fn apply(mf: &mut MfStructure, having: &str, policy: HavingPolicy) -> HavingStats {
    HavingEvaluator::new(having, policy).apply(mf)
}
