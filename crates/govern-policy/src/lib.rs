//! # govern-policy: Policy Evaluation Engine
//!
//! Named, prioritized policies whose rules test fields of a payload and
//! contribute ALLOW, REDACT or DENY. The evaluator reduces all matching rules
//! to one decision with DENY > REDACT > ALLOW precedence.
//!
//! ## Determinism
//!
//! Given the same [`PolicySet`], [`PriorityOrder`] and payload, evaluation
//! produces identical results, matched-rule order included:
//! - policies are sorted by priority, then name;
//! - operators are pure and never fail;
//! - REGEX operands are compiled once when the policy is built.

pub mod evaluation;
pub mod loader;
pub mod operator;
pub mod policy;

// Re-export primary types.
pub use evaluation::{PolicyEvaluator, PolicyOutcome, PriorityOrder};
pub use loader::{load_policies, load_policies_from_str, PolicyFormat};
pub use operator::Operator;
pub use policy::{Policy, PolicyDefinition, PolicyRule, PolicySet, RuleDefinition};
