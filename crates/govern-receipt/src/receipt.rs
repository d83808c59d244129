//! # Compliance Receipts
//!
//! A [`Receipt`] binds a decision to SHA-256 hashes of the payload that came
//! in and the payload that was released, and is signed with HMAC-SHA256.
//!
//! ## Signature Scope
//!
//! The signature covers the JCS canonical bytes of every other field
//! ([`ReceiptBody`]). Changing any of them (a hash, the decision, the
//! timestamp, a metadata value, the PII categories) invalidates the receipt.
//!
//! ## Released Payload
//!
//! `modified_hash` is the hash of what the decision lets through: the
//! modified payload when one was produced, the original when it passes
//! unchanged, and canonical `null` for DENY.

use govern_core::{
    sha256_hex, to_hex, CanonicalBytes, CanonicalizationError, ConfigError, Decision, Timestamp,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Minimum HMAC key length in bytes.
pub const MIN_KEY_LEN: usize = 16;

/// HMAC secret. Never printed.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap key bytes, enforcing [`MIN_KEY_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_KEY_LEN {
            return Err(ConfigError::WeakSigningKey {
                length: bytes.len(),
                minimum: MIN_KEY_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// A signed audit record of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Random v4 identifier.
    pub receipt_id: Uuid,
    /// Agent that submitted the payload.
    pub agent_id: String,
    /// Caller-supplied action label.
    pub action: String,
    /// UTC, microsecond precision.
    pub timestamp: Timestamp,
    /// Final decision.
    pub decision: Decision,
    /// Rule identifiers that matched, in evaluation order.
    pub matched_rules: Vec<String>,
    /// PII categories redacted from the payload, each listed once in a
    /// fixed category order. Empty when nothing was redacted.
    pub pii_categories: Vec<String>,
    /// SHA-256 hex of the canonical original payload.
    pub original_hash: String,
    /// SHA-256 hex of the canonical released payload.
    pub modified_hash: String,
    /// Caller-supplied metadata.
    pub metadata: Value,
    /// HMAC-SHA256 hex over the canonical [`ReceiptBody`].
    pub signature: String,
}

/// Every receipt field except the signature, in signing form.
#[derive(Debug, Serialize)]
pub struct ReceiptBody<'a> {
    receipt_id: &'a Uuid,
    agent_id: &'a str,
    action: &'a str,
    timestamp: &'a Timestamp,
    decision: Decision,
    matched_rules: &'a [String],
    pii_categories: &'a [String],
    original_hash: &'a str,
    modified_hash: &'a str,
    metadata: &'a Value,
}

impl Receipt {
    /// The signed portion of this receipt.
    pub fn body(&self) -> ReceiptBody<'_> {
        ReceiptBody {
            receipt_id: &self.receipt_id,
            agent_id: &self.agent_id,
            action: &self.action,
            timestamp: &self.timestamp,
            decision: self.decision,
            matched_rules: &self.matched_rules,
            pii_categories: &self.pii_categories,
            original_hash: &self.original_hash,
            modified_hash: &self.modified_hash,
            metadata: &self.metadata,
        }
    }
}

/// What the generator needs to know about one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptInput<'a> {
    /// Agent that submitted the payload.
    pub agent_id: &'a str,
    /// Caller-supplied action label.
    pub action: &'a str,
    /// Final decision.
    pub decision: Decision,
    /// Rule identifiers that matched.
    pub matched_rules: &'a [String],
    /// PII categories redacted from the payload.
    pub pii_categories: &'a [String],
    /// Payload as submitted.
    pub original: &'a Value,
    /// Payload after masking and redaction, if it differs.
    pub modified: Option<&'a Value>,
    /// Caller-supplied metadata.
    pub metadata: &'a Value,
}

/// Canonicalizes, hashes and signs receipts under one key.
#[derive(Clone)]
pub struct ReceiptGenerator {
    mac: HmacSha256,
}

impl ReceiptGenerator {
    /// Generator signing with `key`.
    pub fn new(key: &SigningKey) -> Result<Self, ConfigError> {
        let mac = HmacSha256::new_from_slice(&key.0).map_err(|_| ConfigError::WeakSigningKey {
            length: key.len(),
            minimum: MIN_KEY_LEN,
        })?;
        Ok(Self { mac })
    }

    /// Build and sign a receipt stamped now with a fresh id.
    pub fn create_receipt(&self, input: &ReceiptInput<'_>) -> Result<Receipt, CanonicalizationError> {
        self.create_receipt_at(input, Uuid::new_v4(), Timestamp::now())
    }

    /// Build and sign a receipt with an explicit id and timestamp.
    pub fn create_receipt_at(
        &self,
        input: &ReceiptInput<'_>,
        receipt_id: Uuid,
        timestamp: Timestamp,
    ) -> Result<Receipt, CanonicalizationError> {
        let original_hash = payload_hash(input.original)?;
        let modified_hash = match (input.decision, input.modified) {
            (Decision::Deny, _) => payload_hash(&Value::Null)?,
            (_, Some(modified)) => payload_hash(modified)?,
            (_, None) => original_hash.clone(),
        };

        let mut receipt = Receipt {
            receipt_id,
            agent_id: input.agent_id.to_string(),
            action: input.action.to_string(),
            timestamp,
            decision: input.decision,
            matched_rules: input.matched_rules.to_vec(),
            pii_categories: input.pii_categories.to_vec(),
            original_hash,
            modified_hash,
            metadata: input.metadata.clone(),
            signature: String::new(),
        };
        receipt.signature = self.sign(&receipt)?;
        Ok(receipt)
    }

    /// HMAC-SHA256 hex over the receipt's canonical body.
    pub fn sign(&self, receipt: &Receipt) -> Result<String, CanonicalizationError> {
        let body = CanonicalBytes::new(&receipt.body())?;
        let mut mac = self.mac.clone();
        mac.update(body.as_bytes());
        Ok(to_hex(&mac.finalize().into_bytes()))
    }

    /// Recompute the signature and compare in constant time.
    pub fn verify(&self, receipt: &Receipt) -> bool {
        let Ok(expected) = self.sign(receipt) else {
            return false;
        };
        let provided = receipt.signature.as_bytes();
        let expected = expected.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for ReceiptGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptGenerator")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// SHA-256 hex of a payload's canonical form.
pub fn payload_hash(payload: &Value) -> Result<String, CanonicalizationError> {
    Ok(sha256_hex(&CanonicalBytes::new(payload)?))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn signed() -> (ReceiptGenerator, Receipt) {
        let g = ReceiptGenerator::new(&SigningKey::new(*b"proptest-signing-key").unwrap()).unwrap();
        let payload = json!({"msg": "call me at 555-123-4567"});
        let modified = json!({"msg": "call me at [REDACTED_PHONE]"});
        let meta = json!({});
        let rules = vec!["pii#0".to_string()];
        let r = g
            .create_receipt(&ReceiptInput {
                agent_id: "a1",
                action: "send",
                decision: Decision::Redact,
                matched_rules: &rules,
                pii_categories: &["PHONE".to_string()],
                original: &payload,
                modified: Some(&modified),
                metadata: &meta,
            })
            .unwrap();
        (g, r)
    }

    fn mutate(s: &mut String, index: usize, replacement: char) -> bool {
        let bytes = s.as_bytes();
        let i = index % bytes.len();
        if bytes[i] as char == replacement {
            return false;
        }
        s.replace_range(i..i + 1, &replacement.to_string());
        true
    }

    proptest! {
        #[test]
        fn single_byte_mutation_fails_verification(
            field in 0usize..3,
            index in any::<usize>(),
            replacement in prop::sample::select(b"0123456789abcdefXZ".to_vec()),
        ) {
            let (g, mut r) = signed();
            prop_assert!(g.verify(&r));
            let target = match field {
                0 => &mut r.original_hash,
                1 => &mut r.modified_hash,
                _ => &mut r.signature,
            };
            if mutate(target, index, replacement as char) {
                prop_assert!(!g.verify(&r));
            }
        }
    }
}
