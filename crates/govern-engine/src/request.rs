//! Evaluation requests and results.

use govern_core::{Decision, ValidationError};
use govern_pii::LocatedMatch;
use govern_receipt::Receipt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One payload submitted for a governance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Identifier of the agent that produced the payload.
    pub agent_id: String,
    /// The data under review.
    pub payload: Value,
    /// Free-form label for what the agent is doing. May be empty.
    #[serde(default)]
    pub action: String,
    /// Caller context bound into the receipt. Must be a map when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl EvaluationRequest {
    pub fn new(agent_id: impl Into<String>, payload: Value) -> Self {
        Self {
            agent_id: agent_id.into(),
            payload,
            action: String::new(),
            metadata: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Reject requests no rule should ever see.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.agent_id.trim().is_empty() {
            return Err(ValidationError::EmptyAgentId);
        }
        if self.agent_id.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacters(self.agent_id.clone()));
        }
        match &self.metadata {
            None | Some(Value::Object(_)) => Ok(()),
            Some(other) => Err(ValidationError::MetadataNotObject(
                json_type_name(other).to_string(),
            )),
        }
    }

    /// Metadata as recorded in the receipt: the supplied map, or `{}`.
    pub fn receipt_metadata(&self) -> Value {
        self.metadata
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether the receipt for a result reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    /// Appended and synced.
    Persisted,
    /// The store refused the receipt. The decision still stands.
    Failed {
        /// Storage error rendered for the caller.
        warning: String,
    },
}

impl Persistence {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Persisted => None,
            Self::Failed { warning } => Some(warning),
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decision: Decision,
    /// Payload to release downstream. `None` when denied or unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_payload: Option<Value>,
    /// `"<policy>#<index>"` identifiers in evaluation order.
    pub matched_rules: Vec<String>,
    pub reason: String,
    /// PII spans that were substituted, with their payload paths.
    pub pii_matches: Vec<LocatedMatch>,
    pub receipt: Receipt,
    pub persistence: Persistence,
}

impl EvaluationResult {
    /// The payload that may leave the governance boundary, if any.
    pub fn released_payload<'a>(&'a self, original: &'a Value) -> Option<&'a Value> {
        match self.decision {
            Decision::Deny => None,
            _ => Some(self.modified_payload.as_ref().unwrap_or(original)),
        }
    }
}
