//! # Policy Evaluation
//!
//! Reduces a [`PolicySet`] and a payload to one [`Decision`].
//!
//! ## Ordering
//!
//! Enabled policies run in priority order, ascending by default (lower
//! number first) or descending when configured. Ties are broken by policy
//! name, so evaluation is deterministic for a given set and payload.
//! Within a policy, rules run in declaration order.
//!
//! ## Reduction
//!
//! Every matching rule is recorded in `matched_rules`. The first matching
//! DENY stops evaluation: nothing after it is recorded and no field masks
//! are reported. Otherwise any matching REDACT yields REDACT, else ALLOW.

use std::str::FromStr;

use govern_core::{resolve, ConfigError, Decision};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::{Policy, PolicySet};

/// Direction in which policy priorities are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityOrder {
    /// Lower `priority` values run first.
    #[default]
    Ascending,
    /// Higher `priority` values run first.
    Descending,
}

impl PriorityOrder {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl FromStr for PriorityOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" => Ok(Self::Descending),
            _ => Err(ConfigError::InvalidValue {
                key: "priority_order".to_string(),
                value: s.to_string(),
                reason: "expected ascending or descending".to_string(),
            }),
        }
    }
}

/// Result of running the policy set over one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Reduced decision.
    pub decision: Decision,
    /// Identifiers of matching rules, in evaluation order.
    pub matched_rules: Vec<String>,
    /// Field paths of matching REDACT rules, to be masked. Empty on DENY.
    pub redact_fields: Vec<String>,
    /// The rule that denied, if any.
    pub denied_by: Option<String>,
    /// Human-readable explanation.
    pub reason: String,
}

/// Stateless evaluator; holds only its ordering configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator {
    order: PriorityOrder,
}

impl PolicyEvaluator {
    /// Create an evaluator with the given priority direction.
    pub fn new(order: PriorityOrder) -> Self {
        Self { order }
    }

    /// Configured priority direction.
    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    /// Enabled policies of `set` in evaluation order.
    pub fn ordered<'a>(&self, set: &'a PolicySet) -> Vec<&'a Policy> {
        let mut enabled: Vec<&Policy> = set.policies().iter().filter(|p| p.is_enabled()).collect();
        match self.order {
            PriorityOrder::Ascending => enabled.sort_by(|a, b| {
                a.priority()
                    .cmp(&b.priority())
                    .then_with(|| a.name().cmp(b.name()))
            }),
            PriorityOrder::Descending => enabled.sort_by(|a, b| {
                b.priority()
                    .cmp(&a.priority())
                    .then_with(|| a.name().cmp(b.name()))
            }),
        }
        enabled
    }

    /// Evaluate `payload` against `set`.
    pub fn evaluate(&self, set: &PolicySet, payload: &Value) -> PolicyOutcome {
        let mut matched_rules = Vec::new();
        let mut redact_fields: Vec<String> = Vec::new();
        let mut decision = Decision::Allow;

        for policy in self.ordered(set) {
            for rule in policy.rules() {
                if !rule.operator.matches(resolve(payload, &rule.field)) {
                    continue;
                }
                matched_rules.push(rule.id.clone());
                tracing::debug!(rule = %rule.id, action = %rule.action, "rule matched");

                match rule.action {
                    Decision::Deny => {
                        return PolicyOutcome {
                            decision: Decision::Deny,
                            reason: format!(
                                "denied by rule {} (policy \"{}\": {} on {})",
                                rule.id,
                                policy.name(),
                                rule.operator.name(),
                                rule.field
                            ),
                            denied_by: Some(rule.id.clone()),
                            matched_rules,
                            redact_fields: Vec::new(),
                        };
                    }
                    Decision::Redact => {
                        if !redact_fields.contains(&rule.field) {
                            redact_fields.push(rule.field.clone());
                        }
                    }
                    Decision::Allow => {}
                }
                decision = decision.combine(rule.action);
            }
        }

        let reason = match (decision, matched_rules.len()) {
            (_, 0) => "no rules matched".to_string(),
            (Decision::Redact, _) => format!(
                "redaction required by {} field rule(s)",
                redact_fields.len()
            ),
            _ => format!("allowed; {} rule(s) matched", matched_rules.len()),
        };

        PolicyOutcome {
            decision,
            matched_rules,
            redact_fields,
            denied_by: None,
            reason,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::policy::{PolicyDefinition, RuleDefinition};
    use proptest::prelude::*;
    use serde_json::json;

    fn action() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("allow"), Just("redact"), Just("deny")]
    }

    proptest! {
        #[test]
        fn any_matching_deny_wins(
            actions in prop::collection::vec(action(), 1..12),
            priorities in prop::collection::vec(-5i64..5, 12),
        ) {
            let defs: Vec<PolicyDefinition> = actions
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    PolicyDefinition::new(format!("p{i}"))
                        .with_priority(priorities[i])
                        .with_rule(RuleDefinition::new("x", "exists", None, *a))
                })
                .collect();
            let set = PolicySet::from_definitions(&defs).unwrap();
            let payload = json!({"x": 1});

            for order in [PriorityOrder::Ascending, PriorityOrder::Descending] {
                let out = PolicyEvaluator::new(order).evaluate(&set, &payload);
                let expected = actions
                    .iter()
                    .map(|a| match *a {
                        "deny" => Decision::Deny,
                        "redact" => Decision::Redact,
                        _ => Decision::Allow,
                    })
                    .max()
                    .unwrap_or(Decision::Allow);
                prop_assert_eq!(out.decision, expected);
                if expected == Decision::Deny {
                    prop_assert!(out.redact_fields.is_empty());
                    prop_assert!(out.denied_by.is_some());
                }
            }
        }
    }
}
