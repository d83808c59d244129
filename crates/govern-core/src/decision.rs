//! Governance decisions and their precedence.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating a payload.
///
/// Variant order encodes precedence: `Allow < Redact < Deny`, so combining
/// several decisions is `max`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Payload passes unchanged.
    #[default]
    Allow,
    /// Payload passes with sensitive content replaced.
    Redact,
    /// Payload is blocked.
    Deny,
}

impl Decision {
    /// Lowercase label, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Redact => "redact",
            Self::Deny => "deny",
        }
    }

    /// Combine two decisions, keeping the stronger.
    pub fn combine(self, other: Decision) -> Decision {
        self.max(other)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}
