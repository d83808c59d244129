//! PII categories, their precedence and placeholders.

use std::str::FromStr;

use govern_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Kind of sensitive data a scanner recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    /// Email address.
    Email,
    /// North American phone number.
    Phone,
    /// US Social Security number.
    Ssn,
    /// Payment card number (Luhn-valid).
    CreditCard,
    /// IPv4 address.
    IpAddress,
    /// Provider credential or high-entropy secret.
    ApiKey,
}

impl PiiCategory {
    /// Every category, in declaration order.
    pub const ALL: [PiiCategory; 6] = [
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::CreditCard,
        Self::IpAddress,
        Self::ApiKey,
    ];

    /// Precedence when spans collide; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::ApiKey => 6,
            Self::CreditCard => 5,
            Self::Ssn => 4,
            Self::Email => 3,
            Self::Phone => 2,
            Self::IpAddress => 1,
        }
    }

    /// Upper-case label, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Ssn => "SSN",
            Self::CreditCard => "CREDIT_CARD",
            Self::IpAddress => "IP_ADDRESS",
            Self::ApiKey => "API_KEY",
        }
    }

    /// Replacement text for a match of this category.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Email => "[REDACTED_EMAIL]",
            Self::Phone => "[REDACTED_PHONE]",
            Self::Ssn => "[REDACTED_SSN]",
            Self::CreditCard => "[REDACTED_CREDIT_CARD]",
            Self::IpAddress => "[REDACTED_IP_ADDRESS]",
            Self::ApiKey => "[REDACTED_API_KEY]",
        }
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiCategory {
    type Err = ConfigError;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "pii category".to_string(),
                value: s.to_string(),
                reason: "expected one of EMAIL, PHONE, SSN, CREDIT_CARD, IP_ADDRESS, API_KEY"
                    .to_string(),
            })
    }
}
