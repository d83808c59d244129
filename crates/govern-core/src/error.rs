//! # Error Hierarchy
//!
//! Structured error types for the governance core, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Each subsystem defines its own enum carrying the context an operator needs
//! to fix the problem (policy name, rule index, offending value). The
//! top-level [`GovernError`] wraps them and exposes a flat [`ErrorKind`] tag
//! so callers can branch on the category without matching every variant.
//!
//! Configuration problems surface only at load or build time. Evaluation
//! itself can fail only on request validation; storage problems are
//! reported alongside a result, never in place of one.

use thiserror::Error;

/// Top-level error type for the governance core.
#[derive(Error, Debug)]
pub enum GovernError {
    /// Invalid policy definition or engine configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed evaluation request.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Receipt persistence or query failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Payload or receipt body could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl GovernError {
    /// The category tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Canonicalization(_) => ErrorKind::Canonicalization,
        }
    }
}

/// Flat category tag for [`GovernError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ConfigError`].
    Config,
    /// See [`ValidationError`].
    Validation,
    /// See [`StorageError`].
    Storage,
    /// See [`CanonicalizationError`].
    Canonicalization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Storage => "storage",
            Self::Canonicalization => "canonicalization",
        };
        f.write_str(s)
    }
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors raised while loading policies or building the engine.
///
/// Rule positions are zero-based indices into the policy's `rules` list,
/// matching the `"<policy>#<index>"` rule identifiers.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Operator string is not one of equals, contains, regex, exists.
    #[error("policy \"{policy}\" rule {rule}: unknown operator \"{operator}\" (expected equals|contains|regex|exists)")]
    InvalidOperator {
        /// Policy name.
        policy: String,
        /// Rule index.
        rule: usize,
        /// The rejected operator string.
        operator: String,
    },

    /// Action string is not one of allow, deny, redact.
    #[error("policy \"{policy}\" rule {rule}: unknown action \"{action}\" (expected allow|deny|redact)")]
    InvalidAction {
        /// Policy name.
        policy: String,
        /// Rule index.
        rule: usize,
        /// The rejected action string.
        action: String,
    },

    /// REGEX operand failed to compile.
    #[error("policy \"{policy}\" rule {rule}: invalid regex \"{pattern}\": {reason}")]
    InvalidRegex {
        /// Policy name.
        policy: String,
        /// Rule index.
        rule: usize,
        /// The pattern as written.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// Operand has the wrong shape for its operator.
    #[error("policy \"{policy}\" rule {rule}: invalid operand: {reason}")]
    InvalidOperand {
        /// Policy name.
        policy: String,
        /// Rule index.
        rule: usize,
        /// What was expected.
        reason: String,
    },

    /// Rule path is empty.
    #[error("policy \"{policy}\" rule {rule}: field path must be non-empty")]
    EmptyField {
        /// Policy name.
        policy: String,
        /// Rule index.
        rule: usize,
    },

    /// Policy declares no rules.
    #[error("policy \"{0}\" has no rules")]
    EmptyRules(String),

    /// Policy name is empty or whitespace.
    #[error("policy name must be non-empty")]
    EmptyPolicyName,

    /// Two policies in one set share a name.
    #[error("duplicate policy name \"{0}\"")]
    DuplicatePolicy(String),

    /// Definition could not be parsed at all.
    #[error("malformed definition in {source_name}: {reason}")]
    Malformed {
        /// File path or other origin label.
        source_name: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A built-in detector pattern failed to compile.
    #[error("detector pattern for {category} failed to compile: {reason}")]
    DetectorPattern {
        /// PII category label.
        category: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// HMAC signing key is shorter than the minimum.
    #[error("signing key is {length} bytes; at least {minimum} bytes are required")]
    WeakSigningKey {
        /// Supplied key length.
        length: usize,
        /// Required minimum.
        minimum: usize,
    },

    /// No signing key configured.
    #[error("signing key is not configured (set GOVERN_SIGNING_KEY or signing_key)")]
    MissingSigningKey,

    /// A configuration value could not be interpreted.
    #[error("invalid value for {key}: \"{value}\" ({reason})")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// The rejected value.
        value: String,
        /// What was expected.
        reason: String,
    },

    /// Configuration or policy file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Malformed evaluation requests, rejected before any rule runs.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Agent identifier is empty or whitespace.
    #[error("agent_id must be non-empty")]
    EmptyAgentId,

    /// Agent identifier contains control characters.
    #[error("agent_id {0:?} contains control characters")]
    ControlCharacters(String),

    /// Request metadata is present but not a map.
    #[error("metadata must be a map, got {0}")]
    MetadataNotObject(String),

    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Receipt persistence and query failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A complete log line could not be parsed.
    #[error("corrupt receipt log at line {line}: {reason}")]
    Corrupt {
        /// One-based line number.
        line: usize,
        /// Parser diagnostic.
        reason: String,
    },

    /// A receipt with this id is already stored.
    #[error("duplicate receipt id {0}")]
    Duplicate(String),
}
