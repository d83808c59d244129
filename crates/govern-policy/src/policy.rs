//! # Policy Definitions
//!
//! Two layers:
//!
//! - [`PolicyDefinition`] / [`RuleDefinition`] mirror the on-disk format
//!   (strings for operators and actions, free-form operand).
//! - [`Policy`] / [`PolicyRule`] are the validated, immutable forms the
//!   evaluator runs. Building one compiles every REGEX operand, so a policy
//!   that loads can never fail at evaluation time.
//!
//! [`PolicySet`] is a loaded collection with unique names. It is replaced
//! wholesale, never edited in place.

use std::collections::BTreeSet;

use govern_core::{ConfigError, Decision};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operator::Operator;

// ---------------------------------------------------------------------------
// On-disk definitions
// ---------------------------------------------------------------------------

/// A policy as written in a YAML or JSON policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Unique name within a loaded set.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Disabled policies are loaded but skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordering key; see `PriorityOrder`.
    #[serde(default)]
    pub priority: i64,
    /// Rules in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

fn default_enabled() -> bool {
    true
}

impl PolicyDefinition {
    /// An enabled, priority-0 definition with no rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            priority: 0,
            rules: Vec::new(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: RuleDefinition) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A rule as written in a policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Dot-path into the payload.
    #[serde(default)]
    pub field: String,
    /// `equals`, `contains`, `regex` or `exists`.
    pub operator: String,
    /// Operand; ignored by `exists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// `allow`, `deny` or `redact`.
    pub action: String,
}

impl RuleDefinition {
    /// Convenience constructor.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: Option<Value>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            action: action.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated forms
// ---------------------------------------------------------------------------

/// A validated rule.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Identifier reported in `matched_rules`: `"<policy>#<index>"`.
    pub id: String,
    /// Dot-path into the payload.
    pub field: String,
    /// Predicate with its operand.
    pub operator: Operator,
    /// Decision contributed when the rule matches.
    pub action: Decision,
}

/// A validated, immutable policy.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    description: String,
    enabled: bool,
    priority: i64,
    rules: Vec<PolicyRule>,
}

impl Policy {
    /// Validate a definition.
    ///
    /// # Errors
    ///
    /// Empty name, empty rule list, empty field path, unknown operator or
    /// action, bad operand, or a REGEX that does not compile.
    pub fn from_definition(def: &PolicyDefinition) -> Result<Self, ConfigError> {
        let name = def.name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyPolicyName);
        }
        if def.rules.is_empty() {
            return Err(ConfigError::EmptyRules(name.to_string()));
        }

        let rules = def
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| build_rule(name, index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            description: def.description.clone(),
            enabled: def.enabled,
            priority: def.priority,
            rules,
        })
    }

    /// Policy name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Policy description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the evaluator considers this policy.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ordering key.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Rules in declaration order. Never empty.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

fn build_rule(policy: &str, index: usize, def: &RuleDefinition) -> Result<PolicyRule, ConfigError> {
    let field = def.field.trim();
    if field.is_empty() {
        return Err(ConfigError::EmptyField {
            policy: policy.to_string(),
            rule: index,
        });
    }
    let operator = Operator::parse(&def.operator, def.value.as_ref(), policy, index)?;
    let action = parse_action(&def.action).ok_or_else(|| ConfigError::InvalidAction {
        policy: policy.to_string(),
        rule: index,
        action: def.action.clone(),
    })?;

    Ok(PolicyRule {
        id: format!("{policy}#{index}"),
        field: field.to_string(),
        operator,
        action,
    })
}

fn parse_action(s: &str) -> Option<Decision> {
    match s.trim().to_ascii_lowercase().as_str() {
        "allow" => Some(Decision::Allow),
        "deny" => Some(Decision::Deny),
        "redact" => Some(Decision::Redact),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PolicySet
// ---------------------------------------------------------------------------

/// A loaded collection of policies with unique names.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Build a set, rejecting duplicate names.
    pub fn new(policies: Vec<Policy>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for p in &policies {
            if !seen.insert(p.name()) {
                return Err(ConfigError::DuplicatePolicy(p.name().to_string()));
            }
        }
        Ok(Self { policies })
    }

    /// Validate definitions and build a set.
    pub fn from_definitions(defs: &[PolicyDefinition]) -> Result<Self, ConfigError> {
        let policies = defs
            .iter()
            .map(Policy::from_definition)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(policies)
    }

    /// An empty set: every request is allowed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Policies in load order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name() == name)
    }

    /// Number of policies, disabled ones included.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True if the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Total rule count across all policies.
    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|p| p.rules().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deny_rule() -> RuleDefinition {
        RuleDefinition::new("cmd", "contains", Some(json!("rm -rf")), "deny")
    }

    #[test]
    fn definition_defaults_from_yaml() {
        let yaml = r#"
name: block-destructive
rules:
  - field: cmd
    operator: contains
    value: "rm -rf"
    action: deny
"#;
        let def: PolicyDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.enabled);
        assert_eq!(def.priority, 0);
        assert_eq!(def.description, "");
        let policy = Policy::from_definition(&def).unwrap();
        assert_eq!(policy.rules()[0].id, "block-destructive#0");
        assert_eq!(policy.rules()[0].action, Decision::Deny);
    }

    #[test]
    fn rule_ids_follow_declaration_index() {
        let def = PolicyDefinition::new("p")
            .with_rule(deny_rule())
            .with_rule(RuleDefinition::new("user.email", "exists", None, "redact"));
        let policy = Policy::from_definition(&def).unwrap();
        let ids: Vec<_> = policy.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["p#0", "p#1"]);
    }

    #[test]
    fn empty_rules_rejected() {
        let err = Policy::from_definition(&PolicyDefinition::new("p")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRules(name) if name == "p"));
    }

    #[test]
    fn empty_name_rejected() {
        let def = PolicyDefinition::new("  ").with_rule(deny_rule());
        assert!(matches!(
            Policy::from_definition(&def),
            Err(ConfigError::EmptyPolicyName)
        ));
    }

    #[test]
    fn empty_field_rejected() {
        let def = PolicyDefinition::new("p")
            .with_rule(RuleDefinition::new("", "exists", None, "deny"));
        assert!(matches!(
            Policy::from_definition(&def),
            Err(ConfigError::EmptyField { rule: 0, .. })
        ));
    }

    #[test]
    fn unknown_action_rejected() {
        let def = PolicyDefinition::new("p")
            .with_rule(RuleDefinition::new("a", "exists", None, "quarantine"));
        match Policy::from_definition(&def) {
            Err(ConfigError::InvalidAction { action, .. }) => assert_eq!(action, "quarantine"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn actions_are_case_insensitive() {
        let def = PolicyDefinition::new("p")
            .with_rule(RuleDefinition::new("a", "EXISTS", None, "REDACT"));
        let policy = Policy::from_definition(&def).unwrap();
        assert_eq!(policy.rules()[0].action, Decision::Redact);
    }

    #[test]
    fn duplicate_names_rejected() {
        let a = PolicyDefinition::new("same").with_rule(deny_rule());
        let err = PolicySet::from_definitions(&[a.clone(), a]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePolicy(name) if name == "same"));
    }

    #[test]
    fn set_lookup_and_counts() {
        let set = PolicySet::from_definitions(&[
            PolicyDefinition::new("a").with_rule(deny_rule()),
            PolicyDefinition::new("b").with_rule(deny_rule()).with_rule(deny_rule()),
        ])
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rule_count(), 3);
        assert!(set.get("b").is_some());
        assert!(set.get("c").is_none());
    }
}
