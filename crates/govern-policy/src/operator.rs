//! # Rule Operators
//!
//! Pure predicates applied to the value a rule's field path resolves to.
//! Operands are validated and REGEX patterns compiled when the rule is built,
//! so [`Operator::matches`] cannot fail: a type mismatch is simply a
//! non-match.

use govern_core::{ConfigError, Resolved};
use regex::Regex;
use serde_json::Value;

/// Upper bound on compiled pattern size, guarding against pathological
/// policy files.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A validated operator together with its operand.
#[derive(Debug, Clone)]
pub enum Operator {
    /// Exact equality. Numbers compare numerically.
    Equals(Value),
    /// Substring test against a string value.
    Contains(String),
    /// Unanchored search against the value's textual form.
    Regex(Regex),
    /// The path resolves to something, `null` included.
    Exists,
}

impl Operator {
    /// Build an operator from its name and operand.
    ///
    /// `policy` and `rule` only label errors.
    pub fn parse(
        name: &str,
        operand: Option<&Value>,
        policy: &str,
        rule: usize,
    ) -> Result<Self, ConfigError> {
        let bad_operand = |reason: &str| ConfigError::InvalidOperand {
            policy: policy.to_string(),
            rule,
            reason: reason.to_string(),
        };

        match name.trim().to_ascii_lowercase().as_str() {
            "equals" => match operand {
                Some(v) if !v.is_null() => Ok(Self::Equals(v.clone())),
                _ => Err(bad_operand("equals requires a non-null value")),
            },
            "contains" => match operand {
                Some(Value::String(s)) => Ok(Self::Contains(s.clone())),
                _ => Err(bad_operand("contains requires a string value")),
            },
            "regex" => {
                let Some(Value::String(pattern)) = operand else {
                    return Err(bad_operand("regex requires a string pattern"));
                };
                let compiled = regex::RegexBuilder::new(pattern)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|e| ConfigError::InvalidRegex {
                        policy: policy.to_string(),
                        rule,
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Self::Regex(compiled))
            }
            "exists" => Ok(Self::Exists),
            _ => Err(ConfigError::InvalidOperator {
                policy: policy.to_string(),
                rule,
                operator: name.to_string(),
            }),
        }
    }

    /// Lowercase operator name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals(_) => "equals",
            Self::Contains(_) => "contains",
            Self::Regex(_) => "regex",
            Self::Exists => "exists",
        }
    }

    /// Apply the predicate to a resolution result.
    pub fn matches(&self, resolved: Resolved<'_>) -> bool {
        match (self, resolved) {
            (Self::Exists, r) => r.is_found(),
            (_, Resolved::Missing) => false,
            (Self::Equals(expected), Resolved::Found(actual)) => values_equal(actual, expected),
            (Self::Contains(needle), Resolved::Found(actual)) => match actual {
                Value::String(s) => s.contains(needle.as_str()),
                _ => false,
            },
            (Self::Regex(re), Resolved::Found(actual)) => match actual {
                Value::String(s) => re.is_match(s),
                other => re.is_match(&other.to_string()),
            },
        }
    }
}

/// Structural equality where numbers compare by value, so `1 == 1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                }
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
