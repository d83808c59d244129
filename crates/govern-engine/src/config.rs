//! Engine configuration.
//!
//! Read from an optional YAML or JSON file, then overridden by environment
//! variables. Every field has a default except the signing key, which must
//! come from one of the two sources before an engine can be built.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use govern_core::{ConfigError, GovernError};
use govern_pii::PiiCategory;
use govern_policy::{load_policies, PolicyFormat, PolicySet, PriorityOrder};
use govern_receipt::{FileReceiptStore, ReceiptStore, SigningKey};
use serde::Deserialize;

use crate::engine::GovernanceEngine;

/// Environment variable names.
pub const ENV_SIGNING_KEY: &str = "GOVERN_SIGNING_KEY";
pub const ENV_POLICY_PATH: &str = "GOVERN_POLICY_PATH";
pub const ENV_RECEIPT_LOG: &str = "GOVERN_RECEIPT_LOG";
pub const ENV_AUTO_REDACTION: &str = "GOVERN_AUTO_REDACTION";
pub const ENV_PRIORITY_ORDER: &str = "GOVERN_PRIORITY_ORDER";
pub const ENV_PII_CATEGORIES: &str = "GOVERN_PII_CATEGORIES";

/// Settings for building a [`GovernanceEngine`].
///
/// Custom `Debug` implementation redacts the `signing_key` field
/// to prevent credential leakage in log output.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// HMAC key for receipt signatures, at least 16 bytes.
    pub signing_key: Option<String>,
    /// Policy file or directory. No policies when absent.
    pub policy_path: Option<PathBuf>,
    /// JSON-lines receipt log. Receipts stay in memory when absent.
    pub receipt_log: Option<PathBuf>,
    /// Scan every non-denied payload for PII. Default: true.
    pub auto_redaction: bool,
    /// Direction policy priorities are applied in. Default: ascending.
    pub priority_order: PriorityOrder,
    /// PII categories to scan for. All when absent.
    pub pii_categories: Option<Vec<PiiCategory>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            policy_path: None,
            receipt_log: None,
            auto_redaction: true,
            priority_order: PriorityOrder::default(),
            pii_categories: None,
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .field("policy_path", &self.policy_path)
            .field("receipt_log", &self.receipt_log)
            .field("auto_redaction", &self.auto_redaction)
            .field("priority_order", &self.priority_order)
            .field("pii_categories", &self.pii_categories)
            .finish()
    }
}

impl EngineConfig {
    /// Parse a configuration file. The extension picks the format.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let malformed = |reason: String| ConfigError::Malformed {
            source_name: path.display().to_string(),
            reason,
        };
        match PolicyFormat::from_path(path) {
            PolicyFormat::Json => serde_json::from_str(&text).map_err(|e| malformed(e.to_string())),
            PolicyFormat::Yaml if text.trim().is_empty() => Ok(Self::default()),
            PolicyFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| malformed(e.to_string())),
        }
    }

    /// Defaults overridden by the process environment.
    ///
    /// Variables:
    /// - `GOVERN_SIGNING_KEY`
    /// - `GOVERN_POLICY_PATH`
    /// - `GOVERN_RECEIPT_LOG`
    /// - `GOVERN_AUTO_REDACTION` (`true|false|1|0|yes|no|on|off`)
    /// - `GOVERN_PRIORITY_ORDER` (`ascending|descending`)
    /// - `GOVERN_PII_CATEGORIES` (comma-separated, e.g. `EMAIL,PHONE`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// File settings (when a path is given) overridden by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env()
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    /// Empty values are ignored.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var(ENV_SIGNING_KEY) {
            self.signing_key = Some(key);
        }
        if let Some(path) = var(ENV_POLICY_PATH) {
            self.policy_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var(ENV_RECEIPT_LOG) {
            self.receipt_log = Some(PathBuf::from(path));
        }
        if let Some(raw) = var(ENV_AUTO_REDACTION) {
            self.auto_redaction = parse_bool(ENV_AUTO_REDACTION, &raw)?;
        }
        if let Some(raw) = var(ENV_PRIORITY_ORDER) {
            self.priority_order = raw.parse()?;
        }
        if let Some(raw) = var(ENV_PII_CATEGORIES) {
            let categories = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<PiiCategory>, _>>()?;
            self.pii_categories = Some(categories);
        }
        Ok(self)
    }

    /// The configured key, checked for minimum length.
    pub fn signing_key(&self) -> Result<SigningKey, ConfigError> {
        let raw = self
            .signing_key
            .as_deref()
            .ok_or(ConfigError::MissingSigningKey)?;
        SigningKey::new(raw.as_bytes())
    }

    /// Load the configured policies; an empty set when no path is set.
    pub fn policies(&self) -> Result<PolicySet, ConfigError> {
        match &self.policy_path {
            Some(path) => load_policies(path),
            None => Ok(PolicySet::empty()),
        }
    }

    /// Build an engine: load policies, open the receipt log, compile
    /// detectors.
    pub fn build_engine(&self) -> Result<GovernanceEngine, GovernError> {
        let mut builder = GovernanceEngine::builder()
            .signing_key(self.signing_key()?)
            .policies(self.policies()?)
            .auto_redaction(self.auto_redaction)
            .priority_order(self.priority_order);
        if let Some(categories) = &self.pii_categories {
            builder = builder.pii_categories(categories.iter().copied());
        }
        if let Some(log) = &self.receipt_log {
            let store: Arc<dyn ReceiptStore> = Arc::new(FileReceiptStore::open(log)?);
            builder = builder.store(store);
        }
        Ok(builder.build()?)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
