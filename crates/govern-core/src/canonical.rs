//! # Canonical Serialization: JCS Byte Production
//!
//! Defines [`CanonicalBytes`], the sole construction path for bytes that are
//! hashed or signed anywhere in the workspace: payload hashes, receipt
//! signature bodies and receipt log records.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. The only constructor is
//! [`CanonicalBytes::new()`], which routes the value through `serde_json::Value`
//! and then through `serde_jcs` (RFC 8785): object keys sorted by UTF-16 code
//! units, compact separators, ECMAScript number formatting. Two payloads that
//! differ only in key order or whitespace therefore produce identical bytes.
//!
//! Unlike a lossy string formatter, JCS keeps integers and floats distinct in
//! text but normalizes their spelling (`1.50` and `1.5` serialize the same).

use serde::Serialize;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by RFC 8785 canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Object keys are sorted; separators are compact.
/// - Output is valid UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON (for example a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let text = serde_jcs::to_string(&value)?;
        Ok(Self(text.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
